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

//! Read-only lookup of wireless networks and their SSIDs by display name.

use crate::client::ApiError;
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Product type a network must carry to own SSIDs.
pub const WIRELESS: &str = "wireless";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub product_types: Vec<String>,
}

impl NetworkRecord {
    pub fn is_wireless(&self) -> bool {
        self.product_types.iter().any(|t| t == WIRELESS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsidRecord {
    pub number: u32,
    pub name: String,
}

/// Remote listing of an organization's networks and their SSIDs.
pub trait InventorySource {
    fn list_networks(&self, org_id: &str) -> Result<Vec<NetworkRecord>, ApiError>;
    fn list_ssids(&self, network_id: &str) -> Result<Vec<SsidRecord>, ApiError>;
}

/// Pick the organization to work against.
///
/// `requested` matches an id first, then an exact name. Without a request the
/// key must see exactly one organization.
pub fn select_organization(
    orgs: Vec<Organization>,
    requested: Option<&str>,
) -> Result<Organization> {
    if orgs.is_empty() {
        bail!("the API key has no access to any organization");
    }
    let names = || {
        orgs.iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match requested {
        Some(wanted) => {
            let found = orgs
                .iter()
                .position(|o| o.id == wanted)
                .or_else(|| orgs.iter().position(|o| o.name == wanted));
            match found {
                Some(idx) => Ok(orgs[idx].clone()),
                None => Err(anyhow!(
                    "organization `{wanted}` not found; available: {}",
                    names()
                )),
            }
        }
        None if orgs.len() == 1 => Ok(orgs[0].clone()),
        None => Err(anyhow!(
            "the API key can see {} organizations; choose one with --org (available: {})",
            orgs.len(),
            names()
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkEntry {
    pub id: String,
    pub ssids: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryIndex {
    networks: BTreeMap<String, NetworkEntry>,
}

impl InventoryIndex {
    /// Fetch the organization's networks and, for each wireless one, its SSIDs.
    pub fn build<S: InventorySource + ?Sized>(
        source: &S,
        org_id: &str,
    ) -> Result<Self, ApiError> {
        let networks = source.list_networks(org_id)?;
        info!(count = networks.len(), "collected networks");

        let mut index = Self::default();
        for network in networks {
            if !network.is_wireless() {
                debug!(network = %network.name, "skipping non-wireless network");
                continue;
            }
            let ssids = source.list_ssids(&network.id)?;
            index.insert(network, ssids);
        }
        info!(count = index.len(), "indexed wireless networks");
        Ok(index)
    }

    /// Add one network. A name seen before is replaced: the last one wins.
    pub fn insert(&mut self, network: NetworkRecord, ssids: Vec<SsidRecord>) {
        let mut by_name = BTreeMap::new();
        for ssid in ssids {
            if let Some(previous) = by_name.insert(ssid.name.clone(), ssid.number) {
                warn!(
                    network = %network.name,
                    ssid = %ssid.name,
                    shadowed_slot = previous,
                    slot = ssid.number,
                    "duplicate SSID name; keeping the later slot"
                );
            }
        }

        let entry = NetworkEntry {
            id: network.id,
            ssids: by_name,
        };
        if let Some(previous) = self.networks.insert(network.name.clone(), entry) {
            warn!(
                network = %network.name,
                shadowed_id = %previous.id,
                "duplicate network name; keeping the later network"
            );
        }
    }

    pub fn network(&self, name: &str) -> Option<&NetworkEntry> {
        self.networks.get(name)
    }

    pub fn networks(&self) -> impl Iterator<Item = (&str, &NetworkEntry)> {
        self.networks.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Human names for a network id and SSID slot, falling back to the raw values.
    pub fn describe(&self, network_id: &str, ssid_slot: u32) -> (String, String) {
        let found = self
            .networks
            .iter()
            .find(|(_, entry)| entry.id == network_id);
        match found {
            Some((name, entry)) => {
                let ssid = entry
                    .ssids
                    .iter()
                    .find(|(_, slot)| **slot == ssid_slot)
                    .map(|(ssid, _)| ssid.clone())
                    .unwrap_or_else(|| ssid_slot.to_string());
                (name.clone(), ssid)
            }
            None => (network_id.to_string(), ssid_slot.to_string()),
        }
    }
}
