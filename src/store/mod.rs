pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{MAX_RECORDS, SESSIONS_KEY};
use crate::error::StorageError;
use crate::ids::IdGenerator;
use crate::session::SessionSummary;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// String blobs addressed by key
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Box<K> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// One persisted, completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSessionRecord {
    pub id: String,
    pub lesson_id: String,
    pub lesson_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    pub summary: SessionSummary,
    /// milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Everything about a record except its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub lesson_id: String,
    pub lesson_title: String,
    pub track_id: Option<String>,
    pub track_name: Option<String>,
    pub summary: SessionSummary,
    pub timestamp: i64,
}

/// Newest-first session history, capped at `max_records`.
///
/// Concurrent writers sharing one backend are last-writer-wins: each append
/// rewrites the whole list it read.
pub struct SessionStore<K: KeyValueStore> {
    backend: K,
    key: String,
    max_records: usize,
    ids: Arc<dyn IdGenerator>,
}

impl<K: KeyValueStore> std::fmt::Debug for SessionStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("max_records", &self.max_records)
            .finish()
    }
}

impl<K: KeyValueStore> SessionStore<K> {
    pub fn new(backend: K, ids: Arc<dyn IdGenerator>) -> Self {
        Self::with_options(backend, ids, SESSIONS_KEY, MAX_RECORDS)
    }

    pub fn with_options(
        backend: K,
        ids: Arc<dyn IdGenerator>,
        key: &str,
        max_records: usize,
    ) -> Self {
        Self {
            backend,
            key: key.to_string(),
            max_records,
            ids,
        }
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Stored records, newest first. Missing or corrupt data reads as empty.
    pub fn list(&self) -> Vec<TypingSessionRecord> {
        match self.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("session history under {:?} is unreadable, treating as empty: {e}", self.key);
                Vec::new()
            }
        }
    }

    /// Raw read of the persisted list
    pub fn load(&self) -> Result<Vec<TypingSessionRecord>, StorageError> {
        match self.backend.get(&self.key)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    /// Raw overwrite of the persisted list, trimmed to the cap
    pub fn save(&mut self, records: &[TypingSessionRecord]) -> Result<(), StorageError> {
        let kept = &records[..records.len().min(self.max_records)];
        let blob = serde_json::to_string(kept)?;
        self.backend.set(&self.key, &blob)
    }

    /// Insert newest-first. Only a corrupt blob is replaced; read failures are returned.
    pub fn append(&mut self, record: TypingSessionRecord) -> Result<(), StorageError> {
        let mut records = match self.load() {
            Ok(records) => records,
            Err(StorageError::Serialize(e)) => {
                warn!("replacing corrupt session history under {:?}: {e}", self.key);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        records.insert(0, record);
        if records.len() > self.max_records {
            let evicted = records.len() - self.max_records;
            records.truncate(self.max_records);
            debug!("evicted {evicted} oldest session record(s)");
        }
        self.save(&records)
    }

    /// Assign an id and append
    pub fn record(&mut self, new: NewRecord) -> Result<TypingSessionRecord, StorageError> {
        let record = TypingSessionRecord {
            id: self.ids.next_id("record"),
            lesson_id: new.lesson_id,
            lesson_title: new.lesson_title,
            track_id: new.track_id,
            track_name: new.track_name,
            summary: new.summary,
            timestamp: new.timestamp,
        };
        self.append(record.clone())?;
        Ok(record)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.backend.remove(&self.key)
    }
}
