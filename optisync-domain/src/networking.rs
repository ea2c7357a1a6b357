//! 网络能力（networking）
//!
//! 定义事件流与注册两条出站通道的统一抽象，供注册器与事件发送端消费。
//! 实现方决定传输细节（HTTP、mock 等）；失败以 `SyncError::Network`
//! 形态返回，由调用方决定记录重试标记或留存队列。
//!
use crate::error::SyncResult;
use crate::event::WireEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 事件流网络端：批量发送线上事件
///
/// 一个批次是原子单元：要么整批被接受，要么整批失败等待重试，
/// 不存在按事件的部分确认。
#[async_trait]
pub trait EventNetworking: Send + Sync {
    async fn send_events(&self, events: &[WireEvent]) -> SyncResult<()>;
}

/// 注册网络端：发送单个注册请求
#[async_trait]
pub trait RegistrarNetworking: Send + Sync {
    async fn send(&self, request: RegistrationRequest) -> SyncResult<()>;
}

/// 注册请求（封闭变体）
///
/// `SetUser` 将访客/客户身份绑定到远端记录；重复发送同一已收敛身份
/// 必须是服务端视角的无害空操作（幂等要求）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationRequest {
    SetUser(SetUserPayload),
    AddUserAlias(AddAliasPayload),
}

impl RegistrationRequest {
    /// 变体名（用于日志与测试断言）
    pub fn kind(&self) -> &'static str {
        match self {
            RegistrationRequest::SetUser(_) => "set_user",
            RegistrationRequest::AddUserAlias(_) => "add_user_alias",
        }
    }
}

/// set-user 请求载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUserPayload {
    pub visitor_id: String,
    pub customer_id: Option<String>,
    pub installation_id: String,
    pub device_token: Option<Vec<u8>>,
    pub opt_in: bool,
}

/// add-user-alias 请求载荷（单个别名，逐个独立结算）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAliasPayload {
    pub customer_id: String,
    pub alias: String,
}
