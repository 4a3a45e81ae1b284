//! Uploaded and captured artifacts on disk
//!
//! Every file the service stages is written to the temp directory under a
//! tagged name (`{uuid}_{name}` or `camera_{uuid}.jpg`). Files kept as
//! evidence move to the evidence directory, which the sweep never touches.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wildwatch_core::{Error, Result};

/// Prefix of evidence held in the temp directory; never tagged
const HELD_PREFIX: &str = "held_";

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// File name rules
#[derive(Debug)]
struct NamePatterns {
    unsafe_chars: Regex,
    tagged: Regex,
}

impl NamePatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            unsafe_chars: Regex::new(r"[^A-Za-z0-9._-]+")
                .map_err(|e| Error::internal(format!("bad file name pattern: {}", e)))?,
            tagged: Regex::new(&format!(r"^(camera_)?{}[_.]", UUID_PATTERN))
                .map_err(|e| Error::internal(format!("bad temp tag pattern: {}", e)))?,
        })
    }
}

/// Temp and evidence directories
#[derive(Debug, Clone)]
pub struct Artifacts {
    temp_dir: PathBuf,
    evidence_dir: PathBuf,
    names: Arc<NamePatterns>,
}

impl Artifacts {
    pub fn new(temp_dir: impl Into<PathBuf>, evidence_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            temp_dir: temp_dir.into(),
            evidence_dir: evidence_dir.into(),
            names: Arc::new(NamePatterns::new()?),
        })
    }

    /// Reduce a client-supplied file name to a safe single path component
    pub fn sanitize_filename(&self, name: &str) -> String {
        let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
        let cleaned = self.names.unsafe_chars.replace_all(base, "_");
        let cleaned = cleaned.trim_start_matches('.');

        if cleaned.is_empty() {
            "upload".to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Whether `name` carries the temp tag the sweep looks for
    pub fn is_tagged(&self, name: &str) -> bool {
        self.names.tagged.is_match(name)
    }

    /// Create both directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.temp_dir, &self.evidence_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::artifact(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn evidence_dir(&self) -> &Path {
        &self.evidence_dir
    }

    /// Fresh tagged path for an upload named `original`
    pub fn temp_path(&self, original: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}_{}", Uuid::new_v4(), self.sanitize_filename(original)))
    }

    /// Fresh tagged path for a camera frame
    pub fn camera_path(&self) -> PathBuf {
        self.temp_dir.join(format!("camera_{}.jpg", Uuid::new_v4()))
    }

    /// Where `temp` ends up if it is kept as evidence
    pub fn evidence_path(&self, temp: &Path) -> PathBuf {
        match temp.file_name() {
            Some(name) => self.evidence_dir.join(name),
            None => self.evidence_dir.join(format!("{}_evidence", Uuid::new_v4())),
        }
    }

    /// Stage an upload. Completes before classification starts.
    pub async fn write_temp(&self, original: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.temp_path(original);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::artifact(format!("cannot write {}: {}", path.display(), e)))?;
        debug!("Staged {} bytes at {:?}", content.len(), path);
        Ok(path)
    }

    /// Move a staged file into the evidence directory
    pub async fn promote(&self, temp: &Path) -> Result<PathBuf> {
        let target = self.evidence_path(temp);
        if let Err(e) = tokio::fs::create_dir_all(&self.evidence_dir).await {
            warn!("Cannot recreate evidence dir {:?}: {}", self.evidence_dir, e);
        }
        if tokio::fs::rename(temp, &target).await.is_err() {
            // Rename fails across filesystems; fall back to copy and remove
            tokio::fs::copy(temp, &target).await.map_err(|e| {
                Error::artifact(format!("cannot keep {} as evidence: {}", temp.display(), e))
            })?;
            if let Err(e) = tokio::fs::remove_file(temp).await {
                warn!("Kept evidence copy but could not remove {:?}: {}", temp, e);
            }
        }
        info!("Retained evidence at {:?}", target);
        Ok(target)
    }

    /// Rename a staged file in place so the sweep no longer matches it.
    /// Last resort for evidence that could not be promoted.
    pub async fn hold(&self, temp: &Path) -> Result<PathBuf> {
        let name = temp
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::artifact(format!("no file name in {}", temp.display())))?;
        let target = self.temp_dir.join(format!("{}{}", HELD_PREFIX, name));
        tokio::fs::rename(temp, &target).await.map_err(|e| {
            Error::artifact(format!("cannot hold {}: {}", temp.display(), e))
        })?;
        warn!("Holding evidence at {:?} outside the sweep", target);
        Ok(target)
    }

    /// Move a kept file back to its tagged temp path
    pub async fn restore(&self, kept: &Path, temp: &Path) -> Result<()> {
        tokio::fs::rename(kept, temp).await.map_err(|e| {
            Error::artifact(format!(
                "cannot move {} back to {}: {}",
                kept.display(),
                temp.display(),
                e
            ))
        })
    }

    /// Delete `path` on a background task; failures are only logged
    pub fn spawn_delete(&self, path: PathBuf) -> JoinHandle<()> {
        tokio::spawn(async move { remove_logged(&path).await })
    }

    /// Delete `path` now; failures are only logged
    pub async fn delete(&self, path: &Path) {
        remove_logged(path).await;
    }

    /// Save a ranger's photo directly as evidence
    pub async fn save_ranger_photo(&self, original: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.evidence_dir.join(format!(
            "ranger_evidence_{}_{}",
            Uuid::new_v4(),
            self.sanitize_filename(original)
        ));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::artifact(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Delete tagged temp files last modified more than `max_age` ago.
    /// Returns the number of files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.temp_dir).await?;
        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.is_tagged(name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age >= max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Sweep could not remove {:?}: {}", entry.path(), e),
                }
            }
        }

        if removed > 0 {
            info!("Swept {} stale temporary files", removed);
        }
        Ok(removed)
    }

    /// Run [`Artifacts::sweep_stale`] now and then every `interval`
    pub fn spawn_sweeper(&self, max_age: Duration, interval: Duration) -> JoinHandle<()> {
        let artifacts = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = artifacts.sweep_stale(max_age).await {
                    warn!("Temp sweep failed: {}", e);
                }
            }
        })
    }
}

async fn remove_logged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Deleted {:?}", path),
        Err(e) => warn!("Failed to delete {:?}: {}", path, e),
    }
}
