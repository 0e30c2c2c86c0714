use async_trait::async_trait;
use log::debug;
use std::path::{ Path, PathBuf };
use tokio::fs;
use crate::history::{ HistoryStore, StorageError };

/// One JSON document per key: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    key: String,
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            key: key.to_string(),
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_blob(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_blob(&self, blob: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Readers see either the old or the new document, never a partial one.
        let tmp = self.temp_path();
        fs::write(&tmp, blob).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} bytes to {}", blob.len(), self.path.display());
        Ok(())
    }

    async fn remove_blob(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
