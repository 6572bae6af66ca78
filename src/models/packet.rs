use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Transport-layer protocol of a captured frame.
///
/// Decided once per frame by the decoder; everything that is not TCP, UDP
/// or ICMP collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Other => "OTHER",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded frame before it has been admitted to the store.
///
/// Produced by the frame decoder; the store turns it into a `PacketRecord`
/// by assigning a sequence id and attaching the classification result.
#[derive(Debug, Clone)]
pub struct PartialRecord {
    /// Source IP address (absent for non-IP frames)
    pub source_ip: Option<IpAddr>,

    /// Destination IP address (absent for non-IP frames)
    pub dest_ip: Option<IpAddr>,

    /// Source port (for TCP/UDP)
    pub source_port: Option<u16>,

    /// Destination port (for TCP/UDP)
    pub dest_port: Option<u16>,

    /// Transport protocol tag
    pub protocol: Protocol,

    /// Raw L7 payload bytes (may be empty)
    pub payload: Vec<u8>,
}

/// One decoded unit of captured traffic.
///
/// Immutable once inserted: the store only appends records and evicts whole
/// records from the front.
#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    /// Insertion-ordered identifier, unique and strictly increasing for the
    /// life of the process
    pub sequence_id: u64,

    /// Timestamp when the frame was captured
    pub timestamp: DateTime<Utc>,

    /// Source IP address (absent for non-IP frames)
    pub source_ip: Option<IpAddr>,

    /// Destination IP address (absent for non-IP frames)
    pub dest_ip: Option<IpAddr>,

    /// Source port (for TCP/UDP)
    pub source_port: Option<u16>,

    /// Destination port (for TCP/UDP)
    pub dest_port: Option<u16>,

    /// Transport protocol tag
    pub protocol: Protocol,

    /// Payload length in bytes, present even when the payload is empty
    pub length: usize,

    /// Strict UTF-8 decoding of the payload; `None` marks it undecodable
    pub decoded_text: Option<String>,

    /// Raw L7 payload bytes; hex/base64 views are rendered from these on
    /// demand and never stored
    #[serde(skip_serializing)]
    pub payload: Vec<u8>,
}
