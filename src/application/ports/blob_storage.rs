//! Blob Storage Port - 出站端口
//!
//! 缓存条目对应的字节块存储，一个条目一个文件

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use super::content_cache::EntryId;

/// Blob 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Storage operation timed out after {0}ms")]
    Timeout(u64),
}

/// 存储目录中的文件分类（用于启动时清理）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFile {
    /// 已完成写入的 blob
    Blob(EntryId),
    /// 中断写入遗留的临时文件
    Partial(PathBuf),
}

/// Blob Storage Port
#[async_trait]
pub trait BlobStoragePort: Send + Sync {
    /// 原子写入（先写临时文件再重命名），返回写入字节数
    async fn write(&self, id: &EntryId, data: &[u8]) -> Result<u64, StorageError>;

    async fn read(&self, id: &EntryId) -> Result<Vec<u8>, StorageError>;

    /// blob 是否存在；IO 失败或超时返回错误，不等同于不存在
    async fn exists(&self, id: &EntryId) -> Result<bool, StorageError>;

    /// 实际文件大小
    async fn size(&self, id: &EntryId) -> Result<u64, StorageError>;

    /// 删除 blob，不存在视为成功
    async fn delete(&self, id: &EntryId) -> Result<(), StorageError>;

    /// 列出存储目录中的所有 blob 与临时文件
    async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError>;

    /// 删除临时文件
    async fn remove_partial(&self, path: &std::path::Path) -> Result<(), StorageError>;

    /// 脱敏后的展示路径
    fn display_path(&self, id: &EntryId) -> String;
}
