//! File Storage - 文件系统 blob 存储实现
//!
//! 实现 BlobStoragePort trait

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::application::ports::{BlobStoragePort, EntryId, StorageError, StoredFile};
use crate::domain::sanitizer::{abstract_path, sanitize};

/// blob 文件扩展名
const BLOB_EXTENSION: &str = "bin";
/// 临时文件扩展名
const PARTIAL_EXTENSION: &str = "tmp";

/// 文件系统 blob 存储
pub struct FileBlobStorage {
    /// 存储根目录
    base_dir: PathBuf,
    /// 单次 IO 超时
    io_timeout: Duration,
}

impl FileBlobStorage {
    /// 创建新的文件存储，目录不存在时自动创建
    pub async fn new(
        base_dir: impl AsRef<Path>,
        io_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StorageError::IoError(sanitize(&e.to_string())))?;

        Ok(Self {
            base_dir,
            io_timeout,
        })
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// blob 文件路径
    pub fn blob_path(&self, id: &EntryId) -> PathBuf {
        self.base_dir.join(format!("{}.{}", id, BLOB_EXTENSION))
    }

    fn partial_path(&self, id: &EntryId) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}.{}", id, BLOB_EXTENSION, PARTIAL_EXTENSION))
    }

    /// 带超时执行 IO
    async fn bounded<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.io_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(sanitize(&e.to_string())))
            }
            Ok(Err(e)) => Err(StorageError::IoError(sanitize(&e.to_string()))),
            Err(_) => Err(StorageError::Timeout(self.io_timeout.as_millis() as u64)),
        }
    }

    fn classify(path: &Path) -> Option<StoredFile> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(&format!(".{}", PARTIAL_EXTENSION)) {
            return Some(StoredFile::Partial(path.to_path_buf()));
        }
        let stem = name.strip_suffix(&format!(".{}", BLOB_EXTENSION))?;
        let uuid = Uuid::parse_str(stem).ok()?;
        Some(StoredFile::Blob(EntryId::from_uuid(uuid)))
    }
}

#[async_trait]
impl BlobStoragePort for FileBlobStorage {
    async fn write(&self, id: &EntryId, data: &[u8]) -> Result<u64, StorageError> {
        let partial = self.partial_path(id);
        let target = self.blob_path(id);

        let result = self
            .bounded(async {
                let mut file = fs::File::create(&partial).await?;
                file.write_all(data).await?;
                file.sync_all().await?;
                drop(file);
                fs::rename(&partial, &target).await
            })
            .await;

        if let Err(e) = result {
            // 写入失败不能留下半成品
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        tracing::debug!(entry_id = %id, size_bytes = data.len(), "Blob written");
        Ok(data.len() as u64)
    }

    async fn read(&self, id: &EntryId) -> Result<Vec<u8>, StorageError> {
        let path = self.blob_path(id);
        self.bounded(fs::read(&path)).await
    }

    async fn exists(&self, id: &EntryId) -> Result<bool, StorageError> {
        let path = self.blob_path(id);
        match self.bounded(fs::metadata(&path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn size(&self, id: &EntryId) -> Result<u64, StorageError> {
        let path = self.blob_path(id);
        let meta = self.bounded(fs::metadata(&path)).await?;
        Ok(meta.len())
    }

    async fn delete(&self, id: &EntryId) -> Result<(), StorageError> {
        let path = self.blob_path(id);
        match self.bounded(fs::remove_file(&path)).await {
            Ok(()) => {
                tracing::debug!(entry_id = %id, "Blob deleted");
                Ok(())
            }
            Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut files = Vec::new();
        let mut entries = self.bounded(fs::read_dir(&self.base_dir)).await?;

        while let Some(entry) = self.bounded(entries.next_entry()).await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(file) = Self::classify(&path) {
                files.push(file);
            }
        }

        Ok(files)
    }

    async fn remove_partial(&self, path: &Path) -> Result<(), StorageError> {
        match self.bounded(fs::remove_file(path)).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn display_path(&self, id: &EntryId) -> String {
        abstract_path(&self.blob_path(id))
    }
}
