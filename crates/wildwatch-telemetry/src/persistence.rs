//! Audit event persistence
//!
//! JSON-lines file, one chained event per line, appended and flushed per
//! event so a crash loses at most the event being written.

use crate::audit::AuditEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Append-only JSONL writer for audit events
pub struct AuditSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AuditSink {
    /// Open (or create) the file at `path` for appending
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Audit log: {:?}", path);

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write one event and flush it to disk
    pub fn append(&mut self, event: &AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every event from a JSONL audit file. Malformed lines are skipped.
pub fn read_events(path: impl AsRef<Path>) -> std::io::Result<Vec<AuditEvent>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut events = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping malformed audit line {}: {}", number + 1, e),
        }
    }

    Ok(events)
}
