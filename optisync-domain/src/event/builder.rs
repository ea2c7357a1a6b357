//! 线上事件构建器（WireEventBuilder）
//!
//! 将领域事件归一化为线上事件：补齐租户、来源、访客/客户标识，
//! 生成每事件 UUID，并展开属性为有序上下文键值。
//! 访客标识缺失视为前置状态不一致，事件推迟到身份就绪后再上报。
//!
use crate::error::SyncResult;
use crate::event::{ContextEntry, Event, WireEvent, WireMetadata};
use crate::storage::{Storage, StorageExt, require_visitor_id};
use std::sync::Arc;
use uuid::Uuid;

/// 事件类别（单流端点下固定）
const CATEGORY: &str = "track";

pub struct WireEventBuilder {
    tenant: String,
    origin: String,
    storage: Arc<dyn Storage>,
}

impl WireEventBuilder {
    pub fn new(tenant: impl Into<String>, origin: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            tenant: tenant.into(),
            origin: origin.into(),
            storage,
        }
    }

    /// 归一化一个领域事件
    ///
    /// 访客/客户标识在构建时从存储重读，避免使用过期身份。
    pub fn build(&self, event: &Event) -> SyncResult<WireEvent> {
        let visitor = require_visitor_id(self.storage.as_ref())?;

        let context = event
            .attributes()
            .iter()
            .map(|(key, value)| ContextEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect::<Vec<_>>();

        Ok(WireEvent::builder()
            .tenant(self.tenant.clone())
            .category(CATEGORY.to_string())
            .event(event.name().to_string())
            .origin(self.origin.clone())
            .maybe_customer(self.storage.customer_id())
            .visitor(visitor)
            .timestamp(event.timestamp())
            .context(context)
            .metadata(
                WireMetadata::builder()
                    .realtime(event.realtime())
                    .event_id(Uuid::new_v4())
                    .build(),
            )
            .build())
    }

    /// 批量归一化，整批失败即整批推迟
    pub fn build_batch(&self, events: &[Event]) -> SyncResult<Vec<WireEvent>> {
        events.iter().map(|e| self.build(e)).collect()
    }
}
