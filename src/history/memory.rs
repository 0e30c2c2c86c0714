use async_trait::async_trait;
use std::sync::Mutex;
use crate::history::{ HistoryStore, StorageError };

/// In-process blob slot. Holds the serialized form so the store behaves
/// like a real key-value backend, corruption included.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    key: String,
    slot: Mutex<Option<String>>,
}

impl MemoryHistoryStore {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            slot: Mutex::new(None),
        }
    }

    pub fn with_blob(key: &str, blob: &str) -> Self {
        Self {
            key: key.to_string(),
            slot: Mutex::new(Some(blob.to_string())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StorageError> {
        self.slot.lock().map_err(|_| StorageError::Unavailable("memory slot poisoned".into()))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_blob(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot()?.clone())
    }

    async fn write_blob(&self, blob: &str) -> Result<(), StorageError> {
        *self.slot()? = Some(blob.to_string());
        Ok(())
    }

    async fn remove_blob(&self) -> Result<(), StorageError> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Stand-in for contexts without persistent storage.
#[derive(Debug)]
pub struct NoopHistoryStore {
    key: String,
}

impl NoopHistoryStore {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

#[async_trait]
impl HistoryStore for NoopHistoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_blob(&self) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("no persistent storage in this context".into()))
    }

    async fn write_blob(&self, _blob: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn remove_blob(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
