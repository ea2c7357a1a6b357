//! 事件线上形态（WireEvent）
//!
//! 定义事件在传输与持久化队列中的标准形态：租户、类别、来源、
//! 访客/客户标识、有序上下文键值与元数据（通道、实时标记、事件 UUID）。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 线上事件：后端就绪的归一化事件
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct WireEvent {
    /// 租户标识
    tenant: String,
    /// 事件类别
    category: String,
    /// 事件名
    event: String,
    /// 事件来源（如 "sdk"）
    origin: String,
    /// 客户标识（已绑定业务身份时存在）
    customer: Option<String>,
    /// 访客标识
    visitor: String,
    /// 事件发生时间
    timestamp: DateTime<Utc>,
    /// 有序上下文键值
    #[builder(default)]
    context: Vec<ContextEntry>,
    /// 元数据
    metadata: WireMetadata,
}

impl WireEvent {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn customer(&self) -> Option<&str> {
        self.customer.as_deref()
    }

    pub fn visitor(&self) -> &str {
        &self.visitor
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn context(&self) -> &[ContextEntry] {
        &self.context
    }

    pub fn metadata(&self) -> &WireMetadata {
        &self.metadata
    }

    /// 事件唯一标识（队列确认与去重的依据）
    pub fn event_id(&self) -> Uuid {
        self.metadata.event_id
    }

    pub fn realtime(&self) -> bool {
        self.metadata.realtime
    }
}

/// 上下文键值项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub key: String,
    pub value: Value,
}

/// 线上事件元数据
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct WireMetadata {
    /// 投递通道（可选）
    channel: Option<String>,
    /// 是否要求实时通道
    #[builder(default)]
    realtime: bool,
    /// 每事件 UUID
    #[serde(rename = "uuid")]
    event_id: Uuid,
}

impl WireMetadata {
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }
}
