use serde::Serialize;
use std::net::IpAddr;
use tokio::process::Command;

use crate::utils::error::AppResult;

/// Outcome of a system ping or traceroute run.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub ip: IpAddr,
    pub ok: bool,
    pub returncode: i32,
    pub lines: Vec<String>,
}

/// Ping `ip` with the system binary.
///
/// `count` is clamped to 1..=20 and `timeout_ms` to 200..=5000 so a single
/// request cannot tie up a handler for long.
pub async fn ping(ip: IpAddr, count: u32, timeout_ms: u64) -> AppResult<ProbeReport> {
    let count = count.clamp(1, 20);
    let timeout_ms = timeout_ms.clamp(200, 5000);
    let output = ping_command(ip, count, timeout_ms).output().await?;
    Ok(report(ip, &output))
}

#[cfg(target_os = "windows")]
fn ping_command(ip: IpAddr, count: u32, timeout_ms: u64) -> Command {
    // ping -n <count> -w <timeout_ms>
    let mut cmd = Command::new("ping");
    cmd.args([
        "-n",
        &count.to_string(),
        "-w",
        &timeout_ms.to_string(),
        &ip.to_string(),
    ]);
    cmd
}

#[cfg(not(target_os = "windows"))]
fn ping_command(ip: IpAddr, count: u32, timeout_ms: u64) -> Command {
    // ping -c <count> -W <timeout_s>
    let timeout_s = (timeout_ms / 1000).max(1);
    let mut cmd = Command::new("ping");
    cmd.args([
        "-c",
        &count.to_string(),
        "-W",
        &timeout_s.to_string(),
        &ip.to_string(),
    ]);
    cmd
}

/// Trace the route to `ip` with the system tool: numeric output, bounded
/// hop count (clamped to 1..=32).
pub async fn traceroute(ip: IpAddr, max_hops: u32) -> AppResult<ProbeReport> {
    let max_hops = max_hops.clamp(1, 32);
    let output = traceroute_command(ip, max_hops).output().await?;
    Ok(report(ip, &output))
}

#[cfg(target_os = "windows")]
fn traceroute_command(ip: IpAddr, max_hops: u32) -> Command {
    let mut cmd = Command::new("tracert");
    cmd.args(["-d", "-h", &max_hops.to_string(), &ip.to_string()]);
    cmd
}

#[cfg(not(target_os = "windows"))]
fn traceroute_command(ip: IpAddr, max_hops: u32) -> Command {
    let mut cmd = Command::new("traceroute");
    cmd.args(["-n", "-m", &max_hops.to_string(), &ip.to_string()]);
    cmd
}

fn report(ip: IpAddr, output: &std::process::Output) -> ProbeReport {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let lines = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end().to_string())
        .collect();

    ProbeReport {
        ip,
        ok: output.status.success(),
        returncode: output.status.code().unwrap_or(-1),
        lines,
    }
}

/// Pull the round-trip time out of ping output ("time=1.23 ms").
pub fn parse_rtt_ms(lines: &[String]) -> Option<f64> {
    for line in lines {
        if let Some(idx) = line.find("time=") {
            let rest = &line[idx + "time=".len()..];
            let number: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(value) = number.parse() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_is_parsed_from_ping_output() {
        let lines = vec![
            "PING 192.168.1.1 (192.168.1.1) 56(84) bytes of data.".to_string(),
            "64 bytes from 192.168.1.1: icmp_seq=1 ttl=64 time=2.34 ms".to_string(),
        ];
        assert_eq!(parse_rtt_ms(&lines), Some(2.34));
    }

    #[test]
    fn rtt_is_none_without_replies() {
        let lines = vec!["Request timeout for icmp_seq 0".to_string()];
        assert_eq!(parse_rtt_ms(&lines), None);
    }
}
