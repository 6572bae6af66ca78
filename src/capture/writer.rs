use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::packet::PacketRecord;
use crate::utils::error::AppResult;

/// Appends captured records to a JSON-lines file.
///
/// Each line is the record's wire form plus the raw payload as base64, so a
/// capture file stays complete after the ring buffer has evicted the record.
pub struct CaptureFileWriter {
    out: BufWriter<File>,
}

#[derive(Serialize)]
struct FileRow<'a> {
    #[serde(flatten)]
    record: &'a PacketRecord,
    payload_b64: String,
}

impl CaptureFileWriter {
    /// Create (or truncate) the capture file.
    pub fn create(path: &Path) -> AppResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Append one record as a JSON line.
    pub fn write(&mut self, record: &PacketRecord) -> AppResult<()> {
        let row = FileRow {
            record,
            payload_b64: STANDARD.encode(&record.payload),
        };
        serde_json::to_writer(&mut self.out, &row)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> AppResult<()> {
        self.out.flush()?;
        Ok(())
    }
}
