//! JSON Persistence - 队列快照文件

mod queue_store;

pub use queue_store::JsonQueueStateStore;
