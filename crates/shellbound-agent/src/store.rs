//! Persisted agent record storage.
//!
//! The record is read once at session start and written once at the end
//! (plus once right after registration). Writes replace the whole file
//! through a sibling temp file and a rename, so a crash mid-write leaves
//! the previous record intact.

use std::path::{Path, PathBuf};

use shellbound_types::PersistedAgentRecord;
use tracing::{debug, info};

use crate::error::AgentError;

/// Where the agent keeps its credentials and lifetime counters.
pub trait RecordStore {
    /// Read the record; `Ok(None)` when none has been written yet.
    fn load(&self) -> Result<Option<PersistedAgentRecord>, AgentError>;

    /// Replace the stored record.
    fn save(&self, record: &PersistedAgentRecord) -> Result<(), AgentError>;

    /// Forget the API key but keep everything else.
    fn clear_key(&self) -> Result<(), AgentError> {
        if let Some(mut record) = self.load()? {
            record.api_key.clear();
            self.save(&record)?;
        }
        Ok(())
    }
}

/// Pretty-printed JSON file store.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    path: PathBuf,
}

impl JsonRecordStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for JsonRecordStore {
    fn load(&self) -> Result<Option<PersistedAgentRecord>, AgentError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted record");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let record: PersistedAgentRecord = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    fn save(&self, record: &PersistedAgentRecord) -> Result<(), AgentError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(record)?;
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;
        info!(
            path = %self.path.display(),
            agent = %record.agent_name,
            sessions = record.lifetime.sessions,
            "agent record saved"
        );
        Ok(())
    }
}
