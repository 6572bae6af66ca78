use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::packet::Protocol;

/// Counters for the current (or most recent) capture session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureStats {
    /// Total number of frames captured
    pub total_packets: u64,

    /// Total frame bytes captured
    pub total_bytes: u64,

    /// Frames per protocol tag
    pub protocols: HashMap<String, u64>,

    /// Capture start time
    pub start_time: Option<DateTime<Utc>>,

    /// Capture end time (once stopped)
    pub end_time: Option<DateTime<Utc>>,

    /// Transient read errors absorbed by the capture loop
    pub read_errors: u64,
}

impl CaptureStats {
    /// Fresh counters stamped with a start time.
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(at),
            ..Self::default()
        }
    }

    /// Account one captured frame.
    pub fn record(&mut self, protocol: Protocol, frame_bytes: usize) {
        self.total_packets += 1;
        self.total_bytes += frame_bytes as u64;
        *self
            .protocols
            .entry(protocol.as_str().to_string())
            .or_insert(0) += 1;
    }
}
