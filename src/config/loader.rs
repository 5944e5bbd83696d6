//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::sanitizer::abstract_path;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `PLAYCACHE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `PLAYCACHE_QUEUE__MAX_ITEMS=50`
/// - `PLAYCACHE_CACHE__DIR=/var/cache/playcache`
/// - `PLAYCACHE_CACHE__TTL_SECS=86400`
/// - `PLAYCACHE_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("queue.max_items", 100)?
        .set_default("queue.content_max_chars", 1000)?
        .set_default("queue.snapshot_path", "data/queue.json")?
        .set_default("cache.dir", "data/cache")?
        .set_default("cache.max_size_bytes", 100_u64 * 1024 * 1024)?
        .set_default("cache.max_entries", 1000)?
        .set_default("cache.ttl_secs", 7_u64 * 24 * 3600)?
        .set_default("cache.cleanup_interval_secs", 3600)?
        .set_default("cache.io_timeout_ms", 5000)?
        .set_default("log.level", "info")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: PLAYCACHE_CACHE__MAX_ENTRIES=500
    builder = builder.add_source(
        Environment::with_prefix("PLAYCACHE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.queue.max_items == 0 {
        return invalid("Queue max_items cannot be 0");
    }
    if config.queue.content_max_chars == 0 {
        return invalid("Queue content_max_chars cannot be 0");
    }
    if config.queue.snapshot_path.as_os_str().is_empty() {
        return invalid("Queue snapshot path cannot be empty");
    }

    if config.cache.dir.as_os_str().is_empty() {
        return invalid("Cache directory cannot be empty");
    }
    if config.cache.max_size_bytes == 0 || config.cache.max_entries == 0 {
        return invalid("Cache budgets cannot be 0");
    }
    if config.cache.ttl_secs == 0 {
        return invalid("Cache TTL cannot be 0");
    }
    if config.cache.cleanup_interval_secs == 0 {
        return invalid("Cache cleanup interval cannot be 0");
    }
    if config.cache.io_timeout_ms == 0 {
        return invalid("Cache IO timeout cannot be 0");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    for line in config_summary(config) {
        tracing::info!("{}", line);
    }
    tracing::info!("=================================");
}

/// 启动日志内容，路径只输出不可逆的展示串
fn config_summary(config: &AppConfig) -> Vec<String> {
    vec![
        format!("Queue Max Items: {}", config.queue.max_items),
        format!(
            "Queue Snapshot Content Limit: {} chars",
            config.queue.content_max_chars
        ),
        format!(
            "Queue Snapshot: {}",
            abstract_path(&config.queue.snapshot_path)
        ),
        format!("Cache Directory: {}", abstract_path(&config.cache.dir)),
        format!(
            "Cache Budget: {} bytes / {} entries",
            config.cache.max_size_bytes, config.cache.max_entries
        ),
        format!("Cache TTL: {}s", config.cache.ttl_secs),
        format!(
            "Cache Cleanup Interval: {}s",
            config.cache.cleanup_interval_secs
        ),
        format!("Log Level: {}", config.log.level),
    ]
}
