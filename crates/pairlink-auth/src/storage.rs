//! Document storage for pairing codes
//!
//! `JsonFileStore` keeps the `pairingCodes` collection in a JSON file
//! (default `~/.local/share/pairlink/pairingCodes.json`) that code generators
//! write to directly. `MemoryStore` keeps it in process.

use crate::record::PairingRecord;
use async_trait::async_trait;
use pairlink_core::PAIRING_COLLECTION;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed pairing document {pair_id}: {source}")]
    InvalidDocument {
        pair_id: String,
        source: serde_json::Error,
    },
    #[error("Data directory not found")]
    NoDataDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of the conditional `used` update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkUsed {
    /// `used` went from false to true
    Marked,
    /// Another redemption got there first
    AlreadyUsed,
    /// The document no longer exists
    Missing,
}

/// Read one pairing document, flip its `used` field
#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Fetch the record stored under `pair_id`
    async fn get(&self, pair_id: &str) -> StorageResult<Option<PairingRecord>>;

    /// Set `used = true` only if it is currently false
    ///
    /// Touches no other field of the document.
    async fn mark_used(&self, pair_id: &str) -> StorageResult<MarkUsed>;
}

type Documents = Map<String, Value>;

fn parse_record(pair_id: &str, doc: &Value) -> StorageResult<PairingRecord> {
    PairingRecord::deserialize(doc).map_err(|source| StorageError::InvalidDocument {
        pair_id: pair_id.to_string(),
        source,
    })
}

/// Pairing-code collection persisted as a JSON file
///
/// Every lookup re-reads the file so codes written by an external generator
/// are visible immediately. Updates are serialised through `write_lock` and
/// land via temp file + rename.
pub struct JsonFileStore {
    /// Path to the collection file
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the collection at the default location
    pub async fn new() -> StorageResult<Self> {
        let path = Self::default_path()?;
        Self::with_path(path).await
    }

    /// Open the collection at a specific path, creating it if missing
    pub async fn with_path(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };

        if tokio::fs::try_exists(&store.path).await? {
            let count = store.load().await?.len();
            info!("Loaded {} pairing codes from {:?}", count, store.path);
        } else {
            store.save(&Documents::new()).await?;
            debug!("Created empty pairing collection at {:?}", store.path);
        }

        Ok(store)
    }

    /// Default collection path (`<data_dir>/pairlink/pairingCodes.json`)
    pub fn default_path() -> StorageResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(data_dir
            .join("pairlink")
            .join(format!("{}.json", PAIRING_COLLECTION)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<Documents> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Documents::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Documents::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, docs: &Documents) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(docs)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved pairing collection to {:?}", self.path);
        Ok(())
    }

    /// Write a record, replacing any existing document under `pair_id`
    pub async fn insert(&self, pair_id: &str, record: &PairingRecord) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load().await?;
        docs.insert(pair_id.to_string(), serde_json::to_value(record)?);
        self.save(&docs).await
    }
}

#[async_trait]
impl PairingStore for JsonFileStore {
    async fn get(&self, pair_id: &str) -> StorageResult<Option<PairingRecord>> {
        let docs = self.load().await?;
        docs.get(pair_id)
            .map(|doc| parse_record(pair_id, doc))
            .transpose()
    }

    async fn mark_used(&self, pair_id: &str) -> StorageResult<MarkUsed> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load().await?;

        let Some(doc) = docs.get_mut(pair_id) else {
            return Ok(MarkUsed::Missing);
        };

        if parse_record(pair_id, doc)?.used {
            return Ok(MarkUsed::AlreadyUsed);
        }

        match doc.as_object_mut() {
            Some(fields) => {
                fields.insert("used".to_string(), Value::Bool(true));
            }
            // parse_record only accepts objects
            None => return Ok(MarkUsed::Missing),
        }

        self.save(&docs).await?;
        Ok(MarkUsed::Marked)
    }
}

/// In-memory pairing-code collection
#[derive(Default, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, PairingRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record, replacing any existing one under `pair_id`
    pub async fn insert(&self, pair_id: &str, record: PairingRecord) {
        let mut records = self.records.write().await;
        records.insert(pair_id.to_string(), record);
    }
}

#[async_trait]
impl PairingStore for MemoryStore {
    async fn get(&self, pair_id: &str) -> StorageResult<Option<PairingRecord>> {
        let records = self.records.read().await;
        Ok(records.get(pair_id).cloned())
    }

    async fn mark_used(&self, pair_id: &str) -> StorageResult<MarkUsed> {
        let mut records = self.records.write().await;
        Ok(match records.get_mut(pair_id) {
            None => MarkUsed::Missing,
            Some(record) if record.used => MarkUsed::AlreadyUsed,
            Some(record) => {
                record.used = true;
                MarkUsed::Marked
            }
        })
    }
}
