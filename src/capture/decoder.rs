use pnet::packet::{
    ethernet::{EtherTypes, EthernetPacket},
    icmp::IcmpPacket,
    icmpv6::Icmpv6Packet,
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
    Packet as PnetPacket,
};
use std::net::IpAddr;

use crate::models::packet::{PartialRecord, Protocol};

/// Extracts L3/L4 headers and the L7 payload from raw frames.
///
/// Parsing runs from the outside in: the link header is skipped, IPv4/IPv6
/// supply the addresses, TCP/UDP supply the ports, and everything after the
/// deepest parsed header is passed through verbatim as the payload. No
/// protocol-specific framing (HTTP chunking, TLS records) is interpreted.
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a raw frame. Never fails: frames whose headers cannot be
    /// parsed degrade to `OTHER` records carrying the raw bytes.
    pub fn decode(&self, frame: &[u8]) -> PartialRecord {
        let eth = match EthernetPacket::new(frame) {
            Some(eth) => eth,
            None => return Self::degraded(frame),
        };

        match eth.get_ethertype() {
            EtherTypes::Ipv4 => self.decode_ipv4(eth.payload(), frame),
            EtherTypes::Ipv6 => self.decode_ipv6(eth.payload(), frame),
            _ => PartialRecord {
                source_ip: None,
                dest_ip: None,
                source_port: None,
                dest_port: None,
                protocol: Protocol::Other,
                payload: eth.payload().to_vec(),
            },
        }
    }

    fn decode_ipv4(&self, data: &[u8], frame: &[u8]) -> PartialRecord {
        let ip = match Ipv4Packet::new(data) {
            Some(ip) => ip,
            None => return Self::degraded(frame),
        };

        self.decode_transport(
            ip.get_next_level_protocol(),
            ip.payload(),
            Some(IpAddr::V4(ip.get_source())),
            Some(IpAddr::V4(ip.get_destination())),
        )
    }

    fn decode_ipv6(&self, data: &[u8], frame: &[u8]) -> PartialRecord {
        let ip = match Ipv6Packet::new(data) {
            Some(ip) => ip,
            None => return Self::degraded(frame),
        };

        self.decode_transport(
            ip.get_next_header(),
            ip.payload(),
            Some(IpAddr::V6(ip.get_source())),
            Some(IpAddr::V6(ip.get_destination())),
        )
    }

    fn decode_transport(
        &self,
        proto: IpNextHeaderProtocol,
        data: &[u8],
        source_ip: Option<IpAddr>,
        dest_ip: Option<IpAddr>,
    ) -> PartialRecord {
        let mut record = PartialRecord {
            source_ip,
            dest_ip,
            source_port: None,
            dest_port: None,
            protocol: Protocol::Other,
            payload: data.to_vec(),
        };

        match proto {
            IpNextHeaderProtocols::Tcp => {
                if let Some(tcp) = TcpPacket::new(data) {
                    record.protocol = Protocol::Tcp;
                    record.source_port = Some(tcp.get_source());
                    record.dest_port = Some(tcp.get_destination());
                    record.payload = tcp.payload().to_vec();
                }
            }
            IpNextHeaderProtocols::Udp => {
                if let Some(udp) = UdpPacket::new(data) {
                    record.protocol = Protocol::Udp;
                    record.source_port = Some(udp.get_source());
                    record.dest_port = Some(udp.get_destination());
                    record.payload = udp.payload().to_vec();
                }
            }
            IpNextHeaderProtocols::Icmp => {
                if let Some(icmp) = IcmpPacket::new(data) {
                    record.protocol = Protocol::Icmp;
                    record.payload = icmp.payload().to_vec();
                }
            }
            IpNextHeaderProtocols::Icmpv6 => {
                if let Some(icmp) = Icmpv6Packet::new(data) {
                    record.protocol = Protocol::Icmp;
                    record.payload = icmp.payload().to_vec();
                }
            }
            _ => {}
        }

        record
    }

    /// A frame that failed header parsing: no addresses, raw bytes as payload.
    fn degraded(frame: &[u8]) -> PartialRecord {
        PartialRecord {
            source_ip: None,
            dest_ip: None,
            source_port: None,
            dest_port: None,
            protocol: Protocol::Other,
            payload: frame.to_vec(),
        }
    }
}
