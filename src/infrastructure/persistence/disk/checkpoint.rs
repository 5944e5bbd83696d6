//! Cache Metadata Checkpoint
//!
//! 缓存元数据的 JSON 检查点，启动时重新加载并校验

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{CacheEntry, CacheError};
use crate::domain::sanitizer::sanitize;

/// 检查点文件名
pub const CHECKPOINT_FILE_NAME: &str = "metadata.json";

/// 检查点内容
///
/// 未知字段忽略、缺失字段取默认值，保证旧/新版本互相可读
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheCheckpoint {
    #[serde(default)]
    pub entries: Vec<CacheEntry>,
    /// LRU → MRU
    #[serde(default)]
    pub access_order: Vec<String>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub eviction_count: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// 检查点文件
pub struct CheckpointFile {
    path: PathBuf,
    io_timeout: Duration,
}

impl CheckpointFile {
    pub fn new(dir: impl AsRef<Path>, io_timeout: Duration) -> Self {
        Self {
            path: dir.as_ref().join(CHECKPOINT_FILE_NAME),
            io_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn partial_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// 读取检查点，文件不存在时返回 `Ok(None)`
    pub async fn load(&self) -> Result<Option<CacheCheckpoint>, CacheError> {
        let bytes = match tokio::time::timeout(self.io_timeout, fs::read(&self.path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Ok(Err(e)) => return Err(CacheError::StorageError(sanitize(&e.to_string()))),
            Err(_) => {
                return Err(CacheError::StorageError(
                    "checkpoint read timed out".to_string(),
                ))
            }
        };

        let checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        Ok(Some(checkpoint))
    }

    /// 原子写入检查点（临时文件 + 重命名）
    pub async fn save(&self, checkpoint: &CacheCheckpoint) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let partial = self.partial_path();

        let write = async {
            let mut file = fs::File::create(&partial).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&partial, &self.path).await
        };

        let result = match tokio::time::timeout(self.io_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CacheError::StorageError(sanitize(&e.to_string()))),
            Err(_) => Err(CacheError::StorageError(
                "checkpoint write timed out".to_string(),
            )),
        };

        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        result
    }
}
