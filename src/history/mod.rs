mod file;
mod memory;
mod redis;

pub use self::file::FileHistoryStore;
pub use self::memory::{ MemoryHistoryStore, NoopHistoryStore };
pub use self::redis::RedisHistoryStore;

use async_trait::async_trait;
use log::{ info, warn };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;
use crate::cli::Args;
use crate::models::chat::PersistedRecord;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("persistent storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Best-effort persistence of one conversation under one fixed key.
///
/// Backends implement the fallible blob primitives; `load`, `save` and
/// `clear` never fail; problems are logged and degrade to the empty record.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    fn key(&self) -> &str;

    async fn read_blob(&self) -> Result<Option<String>, StorageError>;

    async fn write_blob(&self, blob: &str) -> Result<(), StorageError>;

    async fn remove_blob(&self) -> Result<(), StorageError>;

    async fn load(&self) -> PersistedRecord {
        match self.read_blob().await {
            Ok(Some(blob)) => decode_record(&blob).unwrap_or_else(|e| {
                warn!("Discarding stored conversation '{}': {}", self.key(), e);
                PersistedRecord::default()
            }),
            Ok(None) => PersistedRecord::default(),
            Err(e) => {
                warn!("Could not read conversation '{}': {}", self.key(), e);
                PersistedRecord::default()
            }
        }
    }

    async fn save(&self, record: &PersistedRecord) {
        let blob = match serde_json::to_string(record) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Could not serialize conversation '{}': {}", self.key(), e);
                return;
            }
        };
        if let Err(e) = self.write_blob(&blob).await {
            warn!("Could not persist conversation '{}': {}", self.key(), e);
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.remove_blob().await {
            warn!("Could not clear conversation '{}': {}", self.key(), e);
        }
    }
}

pub fn decode_record(blob: &str) -> Result<PersistedRecord, StorageError> {
    let record: PersistedRecord = serde_json::from_str(blob)?;
    Ok(record.normalize())
}

pub fn default_history_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("nitibot"))
        .unwrap_or_else(|| PathBuf::from(".nitibot"))
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => {
            let dir = args.history_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(default_history_dir);
            Ok(Arc::new(FileHistoryStore::new(dir, &args.storage_key)))
        }
        "redis" => {
            let store = RedisHistoryStore::new(
                &args.history_host,
                &args.history_redis_prefix,
                &args.storage_key
            )?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new(&args.storage_key))),
        "none" => Ok(Arc::new(NoopHistoryStore::new(&args.storage_key))),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    info!("Chat history will be stored in: {} (key '{}')", args.history_type, args.storage_key);
    create_history_store(args)
}
