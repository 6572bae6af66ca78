use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network interface to capture from
    pub interface: Option<String>,

    /// Port for the REST API server
    pub port: u16,

    /// Ring buffer capacity in records
    pub capacity: usize,

    /// Default query-time IP filter
    pub filter_ip: Option<IpAddr>,
}
