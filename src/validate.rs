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

//! Checks one manifest row against the inventory.
//!
//! Checks run in a fixed order and the first failure decides the outcome:
//! network, SSID, VLAN, then services.

use crate::inventory::InventoryIndex;
use crate::manifest::{self, CsvRow};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Services the Dashboard accepts in a forwarding rule.
pub const BONJOUR_SERVICES: [&str; 11] = [
    "All Services",
    "AirPlay",
    "AFP",
    "BitTorrent",
    "FTP",
    "iChat",
    "iTunes",
    "Printers",
    "Samba",
    "Scanners",
    "SSH",
];

/// Exclusive bounds: VLAN 1 and anything from 4096 up are refused.
const VLAN_FLOOR: i64 = 1;
const VLAN_CEILING: i64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonjourRule {
    pub description: String,
    pub vlan_id: String,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RejectReason {
    NetworkNotFound,
    SsidNotFound,
    InvalidVlan,
    InvalidService,
}

impl RejectReason {
    pub const ALL: [RejectReason; 4] = [
        RejectReason::NetworkNotFound,
        RejectReason::SsidNotFound,
        RejectReason::InvalidVlan,
        RejectReason::InvalidService,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RejectReason::NetworkNotFound => "Network Name Mismatch",
            RejectReason::SsidNotFound => "SSID Name Mismatch",
            RejectReason::InvalidVlan => "Bad VLAN ID",
            RejectReason::InvalidService => "Bad Services",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted {
        network_id: String,
        ssid_slot: u32,
        rule: BonjourRule,
    },
    Rejected {
        reason: RejectReason,
        row: CsvRow,
    },
}

pub fn validate(row: &CsvRow, index: &InventoryIndex) -> ValidationOutcome {
    let reject = |reason| ValidationOutcome::Rejected {
        reason,
        row: row.clone(),
    };

    let Some(network) = index.network(row.get(manifest::NETWORK_NAME)) else {
        return reject(RejectReason::NetworkNotFound);
    };
    let Some(&ssid_slot) = network.ssids.get(row.get(manifest::SSID_NAME)) else {
        return reject(RejectReason::SsidNotFound);
    };
    let Some(vlan) = parse_vlan(row.get(manifest::VLAN)) else {
        return reject(RejectReason::InvalidVlan);
    };
    let Some(services) = parse_services(row.get(manifest::SERVICES)) else {
        return reject(RejectReason::InvalidService);
    };

    ValidationOutcome::Accepted {
        network_id: network.id.clone(),
        ssid_slot,
        rule: BonjourRule {
            description: row.get(manifest::DESCRIPTION).to_string(),
            vlan_id: vlan.to_string(),
            services,
        },
    }
}

fn parse_vlan(raw: &str) -> Option<i64> {
    let vlan: i64 = raw.trim().parse().ok()?;
    (vlan > VLAN_FLOOR && vlan < VLAN_CEILING).then_some(vlan)
}

/// All tokens must be known services; the caller's casing is kept.
fn parse_services(raw: &str) -> Option<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .map(|token| is_known_service(token).then(|| token.to_string()))
        .collect()
}

fn is_known_service(token: &str) -> bool {
    let wanted = token.to_lowercase();
    BONJOUR_SERVICES
        .iter()
        .any(|service| service.to_lowercase() == wanted)
}
