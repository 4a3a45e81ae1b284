//! JSON-lines journal store
//!
//! Every mutation is appended to the journal as one JSON line and flushed
//! before the call returns. Opening the store replays the journal into
//! memory; a torn final line from a crash is skipped with a warning.

use crate::memory::StoreState;
use crate::store::{new_record_id, DetectionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wildwatch_core::{Error, RangerResponse, Result, ThreatRecord, ThreatStatus};

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Threat {
        record: ThreatRecord,
    },
    Notified {
        id: String,
        at: DateTime<Utc>,
    },
    Status {
        id: String,
        status: ThreatStatus,
        at: DateTime<Utc>,
    },
    RangerResponse {
        response: RangerResponse,
    },
}

impl JournalEntry {
    fn apply(self, state: &mut StoreState) {
        match self {
            Self::Threat { record } => state.insert_threat(record),
            Self::Notified { id, at } => {
                state.mark_notified(&id, at);
            }
            Self::Status { id, status, at } => {
                state.update_status(&id, status, at);
            }
            Self::RangerResponse { response } => state.insert_response(response),
        }
    }
}

struct Journal {
    state: StoreState,
    writer: BufWriter<File>,
}

impl Journal {
    fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Store backed by an append-only JSONL file
pub struct JsonlStore {
    path: PathBuf,
    journal: Arc<Mutex<Journal>>,
}

impl JsonlStore {
    /// Open the journal at `path`, creating it if missing, and replay it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut state = StoreState::default();
        let mut torn_tail = false;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            replay(&content, &mut state);
            torn_tail = !content.is_empty() && !content.ends_with('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if torn_tail {
            // Terminate the partial line so the next entry starts clean
            file.write_all(b"\n")?;
        }
        info!(
            "Opened journal {:?}: {} threats, {} ranger responses",
            path,
            state.threat_count(),
            state.response_count()
        );

        Ok(Self {
            path,
            journal: Arc::new(Mutex::new(Journal {
                state,
                writer: BufWriter::new(file),
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(content: &str, state: &mut StoreState) {
    let mut applied = 0usize;

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => {
                entry.apply(state);
                applied += 1;
            }
            Err(e) => warn!("Skipping malformed journal line {}: {}", number + 1, e),
        }
    }

    debug!("Replayed {} journal entries", applied);
}

impl JsonlStore {
    /// Run a journal mutation on the blocking pool. File I/O never holds up
    /// a runtime worker, and a caller's timeout can abandon a stuck write.
    async fn write<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Journal) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let journal = Arc::clone(&self.journal);
        tokio::task::spawn_blocking(move || op(&mut *journal.lock()))
            .await
            .map_err(|e| Error::internal(format!("journal write task failed: {}", e)))?
    }
}

#[async_trait]
impl DetectionStore for JsonlStore {
    async fn persist(&self, mut record: ThreatRecord) -> Result<String> {
        record.id = new_record_id();
        let id = record.id.clone();

        self.write(move |journal| {
            record.timestamp = Utc::now();
            let entry = JournalEntry::Threat { record };
            journal.append(&entry)?;
            entry.apply(&mut journal.state);
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<ThreatRecord>> {
        Ok(self.journal.lock().state.get_threat(id))
    }

    async fn mark_notified(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.write(move |journal| {
            let at = Utc::now();
            let already = journal
                .state
                .threat(&id)
                .map(|r| r.notified && r.notified_at.is_some());

            match already {
                None => Ok(false),
                Some(true) => Ok(true),
                Some(false) => {
                    journal.append(&JournalEntry::Notified { id: id.clone(), at })?;
                    journal.state.mark_notified(&id, at);
                    Ok(true)
                }
            }
        })
        .await
    }

    async fn update_status(&self, id: &str, status: ThreatStatus) -> Result<bool> {
        let id = id.to_string();
        self.write(move |journal| {
            let at = Utc::now();
            let unchanged = journal.state.threat(&id).map(|r| r.status == status);

            match unchanged {
                None => Ok(false),
                Some(true) => Ok(true),
                Some(false) => {
                    journal.append(&JournalEntry::Status {
                        id: id.clone(),
                        status,
                        at,
                    })?;
                    journal.state.update_status(&id, status, at);
                    Ok(true)
                }
            }
        })
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ThreatRecord>> {
        Ok(self.journal.lock().state.recent_threats(limit))
    }

    async fn store_ranger_response(&self, mut response: RangerResponse) -> Result<String> {
        response.id = new_record_id();
        let id = response.id.clone();

        self.write(move |journal| {
            let entry = JournalEntry::RangerResponse { response };
            journal.append(&entry)?;
            entry.apply(&mut journal.state);
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn get_ranger_response(&self, id: &str) -> Result<Option<RangerResponse>> {
        Ok(self.journal.lock().state.get_response(id))
    }

    async fn list_ranger_responses(&self, limit: usize) -> Result<Vec<RangerResponse>> {
        Ok(self.journal.lock().state.recent_responses(limit))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
