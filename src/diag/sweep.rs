use futures::stream::{self, StreamExt};
use ipnetwork::Ipv4Network;
use log::info;
use serde::Serialize;
use std::net::IpAddr;
use tokio::process::Command;

use crate::diag::{probe, DeviceRegistry};
use crate::models::device::DeviceOrigin;
use crate::utils::error::{AppError, AppResult};

/// Concurrent pings in flight during a sweep.
const SWEEP_CONCURRENCY: usize = 32;

/// Largest network a single sweep will walk.
const MAX_SWEEP_HOSTS: u32 = 1024;

/// Result summary of a ping sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub network: String,
    pub probed: usize,
    pub responders: usize,
}

/// Ping every address in `network`, recording responders in the registry.
pub async fn ping_sweep(network: &str, registry: &DeviceRegistry) -> AppResult<SweepReport> {
    let network: Ipv4Network = network
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid network '{}': {}", network, e)))?;

    if network.size() > MAX_SWEEP_HOSTS {
        return Err(AppError::BadRequest(format!(
            "network too large to sweep: {} addresses (max {})",
            network.size(),
            MAX_SWEEP_HOSTS
        )));
    }

    info!("Ping sweep of {} ({} addresses)", network, network.size());

    let results: Vec<Option<(IpAddr, Option<f64>)>> = stream::iter(network.iter())
        .map(|host| async move {
            let report = probe::ping(IpAddr::V4(host), 1, 1000).await.ok()?;
            if report.ok {
                Some((report.ip, probe::parse_rtt_ms(&report.lines)))
            } else {
                None
            }
        })
        .buffer_unordered(SWEEP_CONCURRENCY)
        .collect()
        .await;

    let probed = results.len();
    let mut responders = 0;
    for (ip, rtt_ms) in results.into_iter().flatten() {
        registry.observe(ip, None, rtt_ms, DeviceOrigin::Sweep);
        responders += 1;
    }

    info!("Sweep finished: {}/{} responded", responders, probed);

    Ok(SweepReport {
        network: network.to_string(),
        probed,
        responders,
    })
}

/// A parsed ARP/neighbor cache entry.
#[derive(Debug, Clone, Serialize)]
pub struct ArpEntry {
    pub ip: IpAddr,
    pub mac: Option<String>,
}

/// Read the OS ARP/neighbor cache and fold the entries into the registry.
pub async fn read_arp_cache(registry: &DeviceRegistry) -> AppResult<Vec<ArpEntry>> {
    let output = arp_command().output().await?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();

    let entries = parse_arp_output(&text);
    for entry in &entries {
        registry.observe(entry.ip, entry.mac.clone(), None, DeviceOrigin::Arp);
    }

    Ok(entries)
}

#[cfg(target_os = "linux")]
fn arp_command() -> Command {
    let mut cmd = Command::new("ip");
    cmd.args(["neigh", "show"]);
    cmd
}

#[cfg(not(target_os = "linux"))]
fn arp_command() -> Command {
    let mut cmd = Command::new("arp");
    cmd.arg("-a");
    cmd
}

/// Parse `ip neigh` / `arp -a` output. Lines without an address, and
/// neighbor entries with no usable state, are skipped; MAC extraction is
/// best-effort.
fn parse_arp_output(text: &str) -> Vec<ArpEntry> {
    let mut entries = Vec::new();

    for line in text.lines() {
        if line.contains("FAILED") || line.contains("INCOMPLETE") {
            continue;
        }

        let tokens: Vec<&str> = line
            .split_whitespace()
            .map(|t| t.trim_matches(|c| c == '(' || c == ')'))
            .collect();

        let ip = match tokens.iter().find_map(|t| t.parse::<IpAddr>().ok()) {
            Some(ip) => ip,
            None => continue,
        };

        let mac = tokens
            .iter()
            .find(|t| looks_like_mac(t))
            .map(|t| t.to_lowercase());

        entries.push(ArpEntry { ip, mac });
    }

    entries
}

fn looks_like_mac(token: &str) -> bool {
    let separators = |b: &u8| *b == b':' || *b == b'-';
    token.len() == 17 && token.bytes().filter(|b| separators(b)).count() == 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ip_neigh_output() {
        let text = "\
192.168.1.1 dev eth0 lladdr AA:BB:CC:DD:EE:01 REACHABLE
192.168.1.7 dev eth0 lladdr aa:bb:cc:dd:ee:07 STALE
192.168.1.9 dev eth0  FAILED
fe80::1 dev eth0 lladdr aa:bb:cc:dd:ee:01 router REACHABLE
";
        let entries = parse_arp_output(text);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].ip, "192.168.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(entries[0].mac.as_deref(), Some("aa:bb:cc:dd:ee:01"));
        assert_eq!(entries[2].ip, "fe80::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn parses_arp_a_output() {
        let text = "\
gateway (192.168.1.1) at aa:bb:cc:dd:ee:01 [ether] on en0
? (192.168.1.34) at (incomplete) on en0
";
        let entries = parse_arp_output(text);
        // the incomplete entry still has an address but no MAC
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mac.as_deref(), Some("aa:bb:cc:dd:ee:01"));
        assert_eq!(entries[1].mac, None);
    }

    #[test]
    fn oversized_sweep_is_rejected() {
        let registry = DeviceRegistry::new();
        let err = futures::executor::block_on(ping_sweep("10.0.0.0/8", &registry)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn malformed_network_is_rejected() {
        let registry = DeviceRegistry::new();
        let err =
            futures::executor::block_on(ping_sweep("not-a-network", &registry)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
