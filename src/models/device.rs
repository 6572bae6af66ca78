use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;

/// How a device entry was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceOrigin {
    Arp,
    Sweep,
}

/// A host observed by the discovery helpers
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Address the device answered on
    pub ip: IpAddr,

    /// MAC address (from the ARP/neighbor cache, if known)
    pub mac: Option<String>,

    /// Last measured round-trip time in milliseconds
    pub rtt_ms: Option<f64>,

    /// Most recent discovery mechanism that saw this device
    pub origin: DeviceOrigin,

    /// First time the device was observed
    pub first_seen: DateTime<Utc>,

    /// Most recent time the device was observed
    pub last_seen: DateTime<Utc>,
}
