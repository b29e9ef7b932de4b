use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ConfigStore, Namespaces, Section, Transaction};
use crate::error::{SubordinatesError, SubordinatesResult};

/// Store persisted as one pretty-printed JSON document
///
/// Commits write a temporary file beside the target and rename it into
/// place, so a crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> SubordinatesResult<Namespaces> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Namespaces::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Namespaces::new()),
            Err(e) => Err(SubordinatesError::storage("read", e)),
        }
    }

    async fn persist(&self, data: Namespaces) -> SubordinatesResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> SubordinatesResult<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir).map_err(|e| SubordinatesError::storage("mkdir", e))?;

            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| SubordinatesError::storage("tempfile", e))?;
            serde_json::to_writer_pretty(tmp.as_file_mut(), &data)?;
            tmp.as_file_mut()
                .flush()
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|e| SubordinatesError::storage("sync", e))?;
            tmp.persist(&path)?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn read(&self, namespace: &str) -> SubordinatesResult<Vec<Section>> {
        let mut data = self.load().await?;
        Ok(data.remove(namespace).unwrap_or_default())
    }

    async fn commit(&self, transaction: Transaction) -> SubordinatesResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        transaction.apply_to(&mut data)?;
        debug!(
            path = %self.path.display(),
            changes = transaction.changes().len(),
            "Persisting store"
        );
        self.persist(data).await
    }
}
