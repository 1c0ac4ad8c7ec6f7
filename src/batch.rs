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

use crate::manifest::CsvRow;
use crate::validate::{BonjourRule, RejectReason, ValidationOutcome};
use std::collections::BTreeMap;

/// Rules to apply, grouped by network id then SSID slot, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGroup {
    networks: BTreeMap<String, BTreeMap<u32, Vec<BonjourRule>>>,
}

impl BatchGroup {
    pub fn push(&mut self, network_id: String, ssid_slot: u32, rule: BonjourRule) {
        self.networks
            .entry(network_id)
            .or_default()
            .entry(ssid_slot)
            .or_default()
            .push(rule);
    }

    /// Every (network id, SSID slot, rules) group.
    pub fn groups(&self) -> impl Iterator<Item = (&str, u32, &[BonjourRule])> {
        self.networks.iter().flat_map(|(network_id, ssids)| {
            ssids
                .iter()
                .map(move |(slot, rules)| (network_id.as_str(), *slot, rules.as_slice()))
        })
    }

    pub fn group_count(&self) -> usize {
        self.networks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: BTreeMap<RejectReason, Vec<CsvRow>>,
}

impl BatchSummary {
    /// Rejected rows for `reason`, in manifest order.
    pub fn bucket(&self, reason: RejectReason) -> &[CsvRow] {
        self.rejected.get(&reason).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.values().map(Vec::len).sum()
    }

    pub fn all_accepted(&self) -> bool {
        self.accepted == self.total
    }
}

#[derive(Debug, Default)]
pub struct BatchBuilder {
    batch: BatchGroup,
    summary: BatchSummary,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ValidationOutcome) {
        self.summary.total += 1;
        match outcome {
            ValidationOutcome::Accepted {
                network_id,
                ssid_slot,
                rule,
            } => {
                self.summary.accepted += 1;
                self.batch.push(network_id, ssid_slot, rule);
            }
            ValidationOutcome::Rejected { reason, row } => {
                self.summary.rejected.entry(reason).or_default().push(row);
            }
        }
    }

    pub fn finish(self) -> (BatchGroup, BatchSummary) {
        (self.batch, self.summary)
    }
}

impl FromIterator<ValidationOutcome> for BatchBuilder {
    fn from_iter<I: IntoIterator<Item = ValidationOutcome>>(outcomes: I) -> Self {
        let mut builder = Self::new();
        for outcome in outcomes {
            builder.push(outcome);
        }
        builder
    }
}
