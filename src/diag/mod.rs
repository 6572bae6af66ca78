pub mod probe;
pub mod sweep;

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::models::device::{DeviceInfo, DeviceOrigin};

/// Hosts observed by the discovery helpers (ARP cache reads, ping sweeps).
///
/// Keyed by IP; repeated sightings update `last_seen` and fill in fields an
/// earlier sighting lacked. Read-mostly, so a `RwLock` over the map.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<IpAddr, DeviceInfo>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of `ip`, merging into any existing entry.
    pub fn observe(
        &self,
        ip: IpAddr,
        mac: Option<String>,
        rtt_ms: Option<f64>,
        origin: DeviceOrigin,
    ) {
        let now = Utc::now();
        let mut devices = self.devices.write();

        match devices.entry(ip) {
            Entry::Occupied(mut entry) => {
                let device = entry.get_mut();
                device.last_seen = now;
                device.origin = origin;
                if mac.is_some() {
                    device.mac = mac;
                }
                if rtt_ms.is_some() {
                    device.rtt_ms = rtt_ms;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(DeviceInfo {
                    ip,
                    mac,
                    rtt_ms,
                    origin,
                    first_seen: now,
                    last_seen: now,
                });
            }
        }
    }

    /// All known devices, ordered by address.
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self.devices.read().values().cloned().collect();
        devices.sort_by_key(|d| d.ip);
        devices
    }

    /// Number of known devices.
    pub fn count(&self) -> usize {
        self.devices.read().len()
    }
}
