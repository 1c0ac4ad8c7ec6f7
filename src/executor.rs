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

use crate::batch::BatchGroup;
use crate::client::ApiError;
use crate::validate::BonjourRule;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Full replacement of an SSID's Bonjour forwarding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BonjourPayload {
    pub enabled: bool,
    pub rules: Vec<BonjourRule>,
}

impl BonjourPayload {
    pub fn new(rules: Vec<BonjourRule>) -> Self {
        Self {
            enabled: true,
            rules,
        }
    }
}

/// The single remote call that changes Dashboard state.
pub trait BonjourUpdater {
    fn update_bonjour_forwarding(
        &self,
        network_id: &str,
        ssid_slot: u32,
        payload: &BonjourPayload,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateFailure {
    pub network_id: String,
    pub ssid_slot: u32,
    pub payload: BonjourPayload,
    pub error_message: String,
}

/// Issue one update per group, in batch order, and return the ones that failed.
///
/// A failed group is recorded and the run moves on. Nothing is retried and
/// groups applied before a failure stay applied.
pub fn apply<F>(batch: &BatchGroup, mut update: F) -> Vec<UpdateFailure>
where
    F: FnMut(&str, u32, &BonjourPayload) -> Result<(), ApiError>,
{
    let total = batch.group_count();
    let mut failures = Vec::new();

    for (position, (network_id, ssid_slot, rules)) in batch.groups().enumerate() {
        let payload = BonjourPayload::new(rules.to_vec());
        match update(network_id, ssid_slot, &payload) {
            Ok(()) => debug!(
                network_id,
                ssid_slot,
                done = position + 1,
                total,
                "updated bonjour forwarding"
            ),
            Err(err) => {
                warn!(network_id, ssid_slot, error = %err, "bonjour forwarding update failed");
                failures.push(UpdateFailure {
                    network_id: network_id.to_string(),
                    ssid_slot,
                    payload,
                    error_message: err.to_string(),
                });
            }
        }
    }

    info!(groups = total, failed = failures.len(), "update pass finished");
    failures
}

/// [`apply`] against a [`BonjourUpdater`].
pub fn apply_with<U: BonjourUpdater + ?Sized>(
    batch: &BatchGroup,
    updater: &U,
) -> Vec<UpdateFailure> {
    apply(batch, |network_id, ssid_slot, payload| {
        updater.update_bonjour_forwarding(network_id, ssid_slot, payload)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn rule(description: &str) -> BonjourRule {
        BonjourRule {
            description: description.into(),
            vlan_id: "20".into(),
            services: vec!["Printers".into()],
        }
    }

    fn batch() -> BatchGroup {
        let mut batch = BatchGroup::default();
        batch.push("N_1".into(), 0, rule("a"));
        batch.push("N_1".into(), 0, rule("b"));
        batch.push("N_2".into(), 5, rule("c"));
        batch
    }

    #[test]
    fn continues_after_a_failed_group() {
        let mut calls = Vec::new();
        let failures = apply(&batch(), |network_id, ssid_slot, _| {
            calls.push((network_id.to_string(), ssid_slot));
            if network_id == "N_1" {
                Err(ApiError::Status {
                    status: 400,
                    message: "SSID is disabled".into(),
                })
            } else {
                Ok(())
            }
        });

        assert_eq!(calls, [("N_1".to_string(), 0), ("N_2".to_string(), 5)]);
        assert_eq!(failures.len(), 1);
        let failure = &failures[0];
        assert_eq!(failure.network_id, "N_1");
        assert_eq!(failure.ssid_slot, 0);
        assert_eq!(failure.error_message, "SSID is disabled");
        assert_eq!(failure.payload, BonjourPayload::new(vec![rule("a"), rule("b")]));
    }

    #[test]
    fn sends_enabled_payload_with_every_rule_once_per_group() {
        let mut seen = Vec::new();
        let failures = apply(&batch(), |network_id, ssid_slot, payload| {
            seen.push((network_id.to_string(), ssid_slot, payload.clone()));
            Ok(())
        });

        assert!(failures.is_empty());
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, _, p)| p.enabled));
        assert_eq!(seen[0].2.rules, [rule("a"), rule("b")]);
        assert_eq!(seen[1].2.rules, [rule("c")]);
    }

    #[test]
    fn empty_batch_makes_no_calls() {
        let mut calls = 0;
        let failures = apply(&BatchGroup::default(), |_, _, _| {
            calls += 1;
            Ok(())
        });
        assert!(failures.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn apply_with_routes_through_updater() {
        struct Recorder(RefCell<Vec<u32>>);
        impl BonjourUpdater for Recorder {
            fn update_bonjour_forwarding(
                &self,
                _network_id: &str,
                ssid_slot: u32,
                _payload: &BonjourPayload,
            ) -> Result<(), ApiError> {
                self.0.borrow_mut().push(ssid_slot);
                Err(ApiError::Status {
                    status: 404,
                    message: "Not found".into(),
                })
            }
        }

        let recorder = Recorder(RefCell::new(Vec::new()));
        let failures = apply_with(&batch(), &recorder);
        assert_eq!(*recorder.0.borrow(), [0, 5]);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn payload_serializes_for_the_dashboard() {
        let payload = BonjourPayload::new(vec![rule("x")]);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "enabled": true,
                "rules": [{"description": "x", "vlanId": "20", "services": ["Printers"]}]
            })
        );
    }
}
