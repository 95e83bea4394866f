//! JSON-lines output stage.
//!
//! Drains the main queue and writes one JSON object per record. The stage
//! ends when every queue sender has been dropped and the channel is empty.

use std::borrow::Cow;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use kernlog_core::metrics as m;
use kernlog_kernel_input::KernelRecord;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

/// Serialized shape of a record.
#[derive(Debug, Serialize)]
pub struct OutputRecord<'a> {
    pub timestamp: String,
    pub received_at: String,
    pub hostname: &'a str,
    pub input: &'a str,
    pub tag: &'a str,
    pub facility: u8,
    /// Syslog facility name, absent for out-of-range codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<&'static str>,
    pub severity: &'static str,
    pub priority: u32,
    pub message: Cow<'a, str>,
}

impl<'a> OutputRecord<'a> {
    pub fn from_record(record: &'a KernelRecord) -> Self {
        Self {
            timestamp: rfc3339(record.timestamp),
            received_at: rfc3339(record.received_at),
            hostname: &record.host.hostname,
            input: &record.input.input_name,
            tag: record.tag,
            facility: record.facility,
            facility_name: record.facility().map(|f| f.as_str()),
            severity: record.severity.as_str(),
            priority: record.priority(),
            message: record.payload_lossy(),
        }
    }
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format a record as a single JSON line (without the trailing newline).
pub fn format_record(record: &KernelRecord) -> serde_json::Result<String> {
    serde_json::to_string(&OutputRecord::from_record(record))
}

/// Output stage writing to any async writer.
pub struct OutputStage<W> {
    writer: BufWriter<W>,
    written: u64,
}

impl<W> OutputStage<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write a single record and flush it.
    pub async fn write(&mut self, record: &KernelRecord) -> std::io::Result<()> {
        let line = format_record(record)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.written += 1;
        metrics::counter!(m::DAEMON_RECORDS_WRITTEN_TOTAL).increment(1);
        Ok(())
    }

    /// Drain `rx` until the channel closes. Returns the stage so callers can
    /// inspect the writer or the record count.
    pub async fn run(mut self, mut rx: mpsc::Receiver<KernelRecord>) -> std::io::Result<Self> {
        while let Some(record) = rx.recv().await {
            self.write(&record).await?;
        }
        tracing::debug!(written = self.written, "output stage drained");
        Ok(self)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}
