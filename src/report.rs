// bonjourctl - bulk Bonjour forwarding for Meraki wireless networks
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Text tables and JSON documents for validation and update results.

use crate::batch::{BatchGroup, BatchSummary};
use crate::executor::UpdateFailure;
use crate::inventory::InventoryIndex;
use crate::manifest::{self, CsvRow};
use crate::validate::RejectReason;
use serde_json::{Map, Value, json};
use std::fmt::Write as _;

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Header, dashed separator, then rows; columns separated by two spaces.
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No resources found.\n".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate().take(widths.len()) {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        write_line(&mut out, &self.columns, &widths);
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_line(&mut out, &dashes, &widths);
        for row in &self.rows {
            write_line(&mut out, row, &widths);
        }
        out
    }
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let _ = write!(line, "{:width$}", cell, width = *width);
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn validation_headline(summary: &BatchSummary) -> String {
    if summary.all_accepted() {
        "All CSV rows processed. No issues found!".to_string()
    } else {
        format!(
            "Issues were found. Only {} passed of {}",
            summary.accepted, summary.total
        )
    }
}

/// Rejected rows, grouped by reason in a fixed order.
pub fn rejection_table(summary: &BatchSummary) -> Table {
    let mut table = Table::new(
        ["Line", "Error"]
            .into_iter()
            .chain(manifest::REQUIRED_COLUMNS),
    );
    for reason in RejectReason::ALL {
        for row in summary.bucket(reason) {
            let mut cells = vec![row.line.to_string(), reason.label().to_string()];
            cells.extend(
                manifest::REQUIRED_COLUMNS
                    .iter()
                    .map(|column| row.get(column).to_string()),
            );
            table.push_row(cells);
        }
    }
    table
}

/// One line per rule that would be sent.
pub fn plan_table(batch: &BatchGroup, index: &InventoryIndex) -> Table {
    let mut table = Table::new([
        "Network Name",
        "SSID Name",
        "Description",
        "VLAN",
        "Services",
    ]);
    for (network_id, ssid_slot, rules) in batch.groups() {
        let (network, ssid) = index.describe(network_id, ssid_slot);
        for rule in rules {
            table.push_row(vec![
                network.clone(),
                ssid.clone(),
                rule.description.clone(),
                rule.vlan_id.clone(),
                rule.services.join(", "),
            ]);
        }
    }
    table
}

pub fn failure_table(failures: &[UpdateFailure], index: &InventoryIndex) -> Table {
    let mut table = Table::new(["Error", "Network Name", "SSID Name", "Update Payload"]);
    for failure in failures {
        let (network, ssid) = index.describe(&failure.network_id, failure.ssid_slot);
        let payload = serde_json::to_string(&failure.payload).unwrap_or_default();
        table.push_row(vec![failure.error_message.clone(), network, ssid, payload]);
    }
    table
}

fn row_json(row: &CsvRow) -> Value {
    let mut object = Map::new();
    object.insert("line".into(), json!(row.line));
    for (column, value) in row.columns() {
        object.insert(column.to_string(), json!(value));
    }
    Value::Object(object)
}

/// Machine-readable result of a run; `failures` is `None` when nothing was applied.
pub fn run_json(
    summary: &BatchSummary,
    batch: &BatchGroup,
    failures: Option<&[UpdateFailure]>,
) -> Value {
    let mut rejected = Map::new();
    for reason in RejectReason::ALL {
        let rows: Vec<Value> = summary.bucket(reason).iter().map(row_json).collect();
        rejected.insert(format!("{reason:?}"), Value::Array(rows));
    }

    let planned: Vec<Value> = batch
        .groups()
        .map(|(network_id, ssid_slot, rules)| {
            json!({
                "networkId": network_id,
                "ssidSlot": ssid_slot,
                "rules": rules,
            })
        })
        .collect();

    let failures = failures.map(|failures| {
        failures
            .iter()
            .map(|failure| {
                json!({
                    "networkId": failure.network_id,
                    "ssidSlot": failure.ssid_slot,
                    "payload": failure.payload,
                    "error": failure.error_message,
                })
            })
            .collect::<Vec<_>>()
    });

    json!({
        "total": summary.total,
        "accepted": summary.accepted,
        "rejected": rejected,
        "updates": planned,
        "applied": failures.is_some(),
        "failures": failures.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchBuilder;
    use crate::executor::BonjourPayload;
    use crate::inventory::tests::{network, ssid};
    use crate::validate::{BonjourRule, ValidationOutcome};

    fn sample_row(line: u64, network: &str) -> CsvRow {
        CsvRow::new(
            line,
            vec![
                ("Network Name".into(), network.into()),
                ("SSID Name".into(), "Guest".into()),
                ("Description".into(), "Lobby".into()),
                ("VLAN".into(), "1".into()),
                ("Services".into(), "SSH".into()),
            ],
        )
    }

    fn rule() -> BonjourRule {
        BonjourRule {
            description: "Lobby".into(),
            vlan_id: "50".into(),
            services: vec!["SSH".into(), "AirPlay".into()],
        }
    }

    fn summary_and_batch() -> (BatchGroup, BatchSummary) {
        let builder: BatchBuilder = vec![
            ValidationOutcome::Accepted {
                network_id: "N_1".into(),
                ssid_slot: 3,
                rule: rule(),
            },
            ValidationOutcome::Rejected {
                reason: RejectReason::InvalidVlan,
                row: sample_row(3, "HQ"),
            },
            ValidationOutcome::Rejected {
                reason: RejectReason::NetworkNotFound,
                row: sample_row(4, "Branch2"),
            },
        ]
        .into_iter()
        .collect();
        builder.finish()
    }

    #[test]
    fn renders_aligned_columns() {
        let mut table = Table::new(["Name", "VLAN"]);
        table.push_row(vec!["HQ-Guest".into(), "50".into()]);
        table.push_row(vec!["Lab".into(), "4095".into()]);

        assert_eq!(
            table.render(),
            "Name      VLAN\n--------  ----\nHQ-Guest  50\nLab       4095\n"
        );
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(Table::new(["A"]).render(), "No resources found.\n");
    }

    #[test]
    fn headline_counts_passing_rows() {
        let (_, summary) = summary_and_batch();
        assert_eq!(
            validation_headline(&summary),
            "Issues were found. Only 1 passed of 3"
        );
        let (_, clean) = BatchBuilder::new().finish();
        assert_eq!(
            validation_headline(&clean),
            "All CSV rows processed. No issues found!"
        );
    }

    #[test]
    fn rejections_follow_reason_order() {
        let (_, summary) = summary_and_batch();
        let rendered = rejection_table(&summary).render();
        let mismatch = rendered.find("Network Name Mismatch").unwrap();
        let bad_vlan = rendered.find("Bad VLAN ID").unwrap();
        assert!(mismatch < bad_vlan);
        assert!(rendered.contains("Branch2"));
    }

    #[test]
    fn failures_show_human_names() {
        let mut index = InventoryIndex::default();
        index.insert(network("N_1", "HQ", &["wireless"]), vec![ssid(3, "Guest")]);
        let failures = vec![UpdateFailure {
            network_id: "N_1".into(),
            ssid_slot: 3,
            payload: BonjourPayload::new(vec![rule()]),
            error_message: "VLAN not found".into(),
        }];

        let rendered = failure_table(&failures, &index).render();
        assert!(rendered.contains("VLAN not found  HQ"));
        assert!(rendered.contains("Guest"));
        assert!(rendered.contains(r#""vlanId":"50""#));
    }

    #[test]
    fn plan_lists_every_rule() {
        let (batch, _) = summary_and_batch();
        let mut index = InventoryIndex::default();
        index.insert(network("N_1", "HQ", &["wireless"]), vec![ssid(3, "Guest")]);
        let rendered = plan_table(&batch, &index).render();
        assert!(rendered.contains("HQ            Guest      Lobby        50    SSH, AirPlay"));
    }

    #[test]
    fn json_document_carries_buckets_and_failures() {
        let (batch, summary) = summary_and_batch();
        let doc = run_json(&summary, &batch, None);

        assert_eq!(doc["total"], 3);
        assert_eq!(doc["accepted"], 1);
        assert_eq!(doc["applied"], false);
        assert_eq!(doc["rejected"]["InvalidVlan"][0]["line"], 3);
        assert_eq!(doc["rejected"]["NetworkNotFound"][0]["Network Name"], "Branch2");
        assert_eq!(doc["rejected"]["SsidNotFound"], json!([]));
        assert_eq!(doc["updates"][0]["networkId"], "N_1");
        assert_eq!(doc["updates"][0]["rules"][0]["vlanId"], "50");
        assert_eq!(doc["failures"], json!([]));
    }
}
