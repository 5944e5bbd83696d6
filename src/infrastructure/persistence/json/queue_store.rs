//! JSON Queue State Store
//!
//! 队列快照写入单个 JSON 文件，写入使用临时文件 + 重命名

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{QueueSnapshot, QueueStateStorePort, QueueStoreError};
use crate::domain::sanitizer::{abstract_path, sanitize};

/// JSON 文件队列快照存储
pub struct JsonQueueStateStore {
    path: PathBuf,
    io_timeout: Duration,
}

impl JsonQueueStateStore {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            io_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let partial = self.partial_path();
        let mut file = fs::File::create(&partial).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&partial, &self.path).await
    }
}

#[async_trait]
impl QueueStateStorePort for JsonQueueStateStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), QueueStoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| QueueStoreError::SerializationError(e.to_string()))?;

        match tokio::time::timeout(self.io_timeout, self.write_atomic(&bytes)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    items = snapshot.items.len(),
                    path = %abstract_path(&self.path),
                    "Queue snapshot saved"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = fs::remove_file(self.partial_path()).await;
                Err(QueueStoreError::IoError(sanitize(&e.to_string())))
            }
            Err(_) => {
                let _ = fs::remove_file(self.partial_path()).await;
                Err(QueueStoreError::IoError(format!(
                    "snapshot write timed out after {}ms",
                    self.io_timeout.as_millis()
                )))
            }
        }
    }

    async fn load(&self) -> Option<QueueSnapshot> {
        let bytes = match tokio::time::timeout(self.io_timeout, fs::read(&self.path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Ok(Err(e)) => {
                tracing::warn!(error = %sanitize(&e.to_string()), "Failed to read queue snapshot");
                return None;
            }
            Err(_) => {
                tracing::warn!("Queue snapshot read timed out");
                return None;
            }
        };

        match serde_json::from_slice::<QueueSnapshot>(&bytes) {
            Ok(snapshot) => {
                tracing::info!(items = snapshot.items.len(), "Queue snapshot loaded");
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Queue snapshot is corrupt, ignoring");
                None
            }
        }
    }
}
