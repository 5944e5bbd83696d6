//! Playcache - 播放队列与内容缓存服务
//!
//! 启动顺序：配置 → 日志 → 缓存（恢复 + 定时清理）→ 队列（恢复快照）
//! 退出时保存队列快照并写入缓存检查点

use std::sync::Arc;

use playcache::application::ports::{ContentCachePort, PlaybackQueuePort, QueueStateStorePort};
use playcache::config::{load_config, print_config};
use playcache::infrastructure::events::EventPublisher;
use playcache::infrastructure::memory::InMemoryPlaybackQueue;
use playcache::infrastructure::persistence::{DiskContentCache, JsonQueueStateStore};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},playcache={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Playcache - 播放队列与内容缓存");
    print_config(&config);

    // 创建事件发布器
    let event_publisher = EventPublisher::new().arc();

    // 打开内容缓存并启动过期清理
    let cache = DiskContentCache::open(config.cache.disk_cache_config())
        .await?
        .with_event_publisher(event_publisher.clone())
        .arc();
    cache.start_maintenance().await;

    // 创建播放队列并恢复快照
    let queue = InMemoryPlaybackQueue::new(config.queue.queue_config())
        .with_event_publisher(event_publisher.clone())
        .arc();
    let queue_store = JsonQueueStateStore::new(&config.queue.snapshot_path, config.cache.io_timeout());
    if let Some(snapshot) = queue_store.load().await {
        queue.restore_state(snapshot);
    }

    // 事件日志
    let mut events = event_publisher.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(event = ?event, "Event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Event log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stats = cache.stats().await;
    tracing::info!(
        queue_items = queue.len(),
        cache_entries = stats.entry_count,
        cache_bytes = stats.total_size,
        "Ready, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    if let Err(e) = queue_store.save(&queue.get_state()).await {
        tracing::error!(error = %e, "Failed to save queue snapshot");
    }
    cache.dispose().await;
    event_log.abort();

    tracing::info!("Shutdown complete");

    Ok(())
}
