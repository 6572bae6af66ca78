use log::info;
use pnet_datalink::{self as datalink, Channel, Config, DataLinkReceiver};
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use crate::models::interface::InterfaceInfo;
use crate::utils::error::{AppError, AppResult};

/// Read timeout for the datalink channel. Bounds how long a blocking read
/// can delay a stop request.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A source of raw link-layer frames.
///
/// `read_next` returns `Ok(None)` when the read times out, which gives the
/// capture loop its cancellation check point between frames. Dropping the
/// source releases the underlying OS handle; `Drop` makes close idempotent.
pub trait CaptureSource: Send {
    /// Read the next frame, or `None` if the read timed out.
    fn read_next(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Name of the interface this source captures on.
    fn interface_name(&self) -> &str;
}

/// Live capture through a pnet datalink Ethernet channel.
pub struct PnetSource {
    interface_name: String,
    rx: Box<dyn DataLinkReceiver>,
}

impl std::fmt::Debug for PnetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PnetSource")
            .field("interface_name", &self.interface_name)
            .finish_non_exhaustive()
    }
}

impl PnetSource {
    /// Open a capture handle on the named interface.
    ///
    /// Fails with `InterfaceNotFound` when no such interface exists and with
    /// `PermissionDenied` when the process lacks capture privileges.
    pub fn open(name: &str) -> AppResult<Self> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| AppError::InterfaceNotFound(name.to_string()))?;

        let config = Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Config::default()
        };

        let rx = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(AppError::Channel(
                    "unsupported channel type".to_string(),
                ))
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("permission") || msg.contains("Operation not permitted") {
                    return Err(AppError::PermissionDenied(name.to_string()));
                }
                return Err(AppError::Channel(msg));
            }
        };

        info!("Opened capture on interface: {}", name);

        Ok(Self {
            interface_name: name.to_string(),
            rx,
        })
    }
}

impl CaptureSource for PnetSource {
    fn read_next(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.rx.next() {
            Ok(frame) => Ok(Some(frame.to_vec())),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn interface_name(&self) -> &str {
        &self.interface_name
    }
}

/// Whether a read error means the interface vanished rather than a
/// transient hiccup.
pub fn is_fatal_read_error(e: &io::Error) -> bool {
    // ENXIO (6) / ENODEV (19): the device is gone
    matches!(e.raw_os_error(), Some(6) | Some(19)) || e.kind() == io::ErrorKind::NotFound
}

/// List capturable interfaces with their addresses.
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    datalink::interfaces()
        .into_iter()
        .map(|iface| {
            let ipv4_address = iface.ips.iter().find_map(|ip| match ip.ip() {
                IpAddr::V4(v4) => Some(v4.to_string()),
                IpAddr::V6(_) => None,
            });

            InterfaceInfo {
                ipv4_address,
                mac_address: iface.mac.map(|mac| mac.to_string()),
                is_loopback: iface.is_loopback(),
                is_up: iface.is_up(),
                name: iface.name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interface_fails_at_open() {
        let err = PnetSource::open("definitely-not-a-nic-0").unwrap_err();
        assert!(matches!(err, AppError::InterfaceNotFound(_)));
    }

    #[test]
    fn fatal_read_errors_are_recognized() {
        assert!(is_fatal_read_error(&io::Error::from_raw_os_error(19)));
        assert!(is_fatal_read_error(&io::Error::from_raw_os_error(6)));
        assert!(!is_fatal_read_error(&io::Error::new(
            io::ErrorKind::Interrupted,
            "try again"
        )));
    }
}
