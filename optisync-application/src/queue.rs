//! 持久化事件队列（EventQueue）
//!
//! 线上事件的有序留存序列：入队追加、按 FIFO 取头部、按事件 UUID 确认移除。
//! 队列内容经由存储能力落盘，进程中断后批次可原样恢复；
//! 发送中途不可取消的批次依赖该持久性在重启后重投。
//!
use optisync_domain::event::WireEvent;
use optisync_domain::storage::{Storage, StorageKey};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// 事件队列能力：FIFO 契约
pub trait EventQueue: Send + Sync {
    /// 追加一组事件到队尾
    fn enqueue(&self, events: Vec<WireEvent>);

    /// 取队头最多 `limit` 个事件（不移除）
    fn first(&self, limit: usize) -> Vec<WireEvent>;

    /// 按事件 UUID 移除已确认送达的事件
    fn remove(&self, events: &[WireEvent]);

    fn is_empty(&self) -> bool {
        self.first(1).is_empty()
    }
}

/// 基于存储能力的持久化队列实现
///
/// 整个序列存于单个键下，追加与移除都走原子读改写；
/// 多生产者入队互不丢失，顺序保持入队序。
pub struct PersistedEventQueue {
    storage: Arc<dyn Storage>,
}

impl PersistedEventQueue {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn read(value: Option<serde_json::Value>) -> Vec<WireEvent> {
        value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

impl EventQueue for PersistedEventQueue {
    fn enqueue(&self, events: Vec<WireEvent>) {
        if events.is_empty() {
            return;
        }
        self.storage.update(StorageKey::EventQueue, &mut |current| {
            let fallback = current.clone();
            let mut queued = Self::read(current);
            queued.extend(events.iter().cloned());
            match serde_json::to_value(&queued) {
                Ok(value) => Some(value),
                Err(err) => {
                    error!(%err, "failed to serialize event queue, batch dropped");
                    fallback
                }
            }
        });
    }

    fn first(&self, limit: usize) -> Vec<WireEvent> {
        let mut queued = Self::read(self.storage.get(StorageKey::EventQueue));
        queued.truncate(limit);
        queued
    }

    fn remove(&self, events: &[WireEvent]) {
        if events.is_empty() {
            return;
        }
        let acknowledged: HashSet<Uuid> = events.iter().map(WireEvent::event_id).collect();
        self.storage.update(StorageKey::EventQueue, &mut |current| {
            let queued = Self::read(current);
            let remaining: Vec<WireEvent> = queued
                .into_iter()
                .filter(|e| !acknowledged.contains(&e.event_id()))
                .collect();
            serde_json::to_value(&remaining).ok()
        });
    }
}
