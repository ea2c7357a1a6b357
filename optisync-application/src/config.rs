//! 同步内核配置
//!
//! 纯数据配置结构，由宿主在初始化时装配后注入各组件。
//!
use std::time::Duration;

/// 全局配置：租户、来源与实时通道路由
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// 租户标识
    pub tenant_id: String,
    /// 事件来源标识
    pub origin: String,
    /// 是否启用实时通道
    pub realtime_enabled: bool,
    /// 实时事件是否改经持久化事件流投递
    ///
    /// 为 true 时实时组件旁路退化为空操作，实时事件由持久化队列负责；
    /// 为 false 且实时通道启用时，持久化队列必须抑制实时事件以避免重复。
    pub realtime_through_stream: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            origin: "sdk".to_string(),
            realtime_enabled: false,
            realtime_through_stream: false,
        }
    }
}

/// 跟踪器配置：批量大小与后台冲刷间隔
#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// 单批发送的事件数上限
    pub batch_size: usize,
    /// 后台重试冲刷的间隔
    pub flush_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(30),
        }
    }
}
