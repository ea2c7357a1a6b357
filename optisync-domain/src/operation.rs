//! 领域操作（Operation）
//!
//! 以封闭枚举表达一次触发源产生的领域意图（身份变更、授权变更、令牌到达、
//! 事件上报等）。构造后不可变，仅携带该变体所需的数据；
//! 管线与各组件边界均做穷尽匹配，不允许默认分支。
//!
use crate::event::Event;
use serde::{Deserialize, Serialize};

/// 领域操作：一次触发源构造的命令
#[derive(Debug, Clone)]
pub enum Operation {
    /// 绑定/切换本地用户标识
    SetUserId(String),
    /// 用户授权通知
    OptIn,
    /// 用户撤销通知授权
    OptOut,
    /// 平台推送令牌到达
    DeviceToken(Vec<u8>),
    /// 上报一组领域事件
    Report(Vec<Event>),
    /// 无条件重发远端注册
    PerformRegistration,
    /// 订阅远端主题
    SubscribeToTopic(String),
    /// 退订远端主题
    UnsubscribeFromTopic(String),
    /// 应用打开信号
    AppOpen,
}

impl Operation {
    /// 变体名（用于日志与失败标记）
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::SetUserId(_) => "set_user_id",
            Operation::OptIn => "opt_in",
            Operation::OptOut => "opt_out",
            Operation::DeviceToken(_) => "device_token",
            Operation::Report(_) => "report",
            Operation::PerformRegistration => "perform_registration",
            Operation::SubscribeToTopic(_) => "subscribe_to_topic",
            Operation::UnsubscribeFromTopic(_) => "unsubscribe_from_topic",
            Operation::AppOpen => "app_open",
        }
    }
}

/// 通知授权状态，持久化为布尔标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptStatus {
    OptIn,
    OptOut,
}

impl OptStatus {
    /// 由平台授权结果映射为目标状态
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            OptStatus::OptIn
        } else {
            OptStatus::OptOut
        }
    }

    /// 持久化标记形态
    pub fn as_flag(self) -> bool {
        matches!(self, OptStatus::OptIn)
    }
}

impl From<OptStatus> for Operation {
    fn from(status: OptStatus) -> Self {
        match status {
            OptStatus::OptIn => Operation::OptIn,
            OptStatus::OptOut => Operation::OptOut,
        }
    }
}
