use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 领域事件：一次领域发生的不可变记录
///
/// 由触发源构造，经 `WireEventBuilder` 归一化后交由事件队列独占，
/// 直至确认送达或耗尽重试。
#[derive(Builder, Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// 事件名
    name: String,
    /// 事件发生时间
    #[builder(default = Utc::now())]
    timestamp: DateTime<Utc>,
    /// 不可变属性映射（键序稳定）
    #[builder(default)]
    attributes: BTreeMap<String, Value>,
    /// 是否要求实时通道
    #[builder(default)]
    realtime: bool,
    /// 可选上下文
    context: Option<Value>,
}

impl Event {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }
}
