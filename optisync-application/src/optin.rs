//! 授权服务（OptInService）
//!
//! 跟踪用户的通知授权状态，仅在状态真正翻转时产生副作用。
//! 副作用顺序固定且不可重排：
//! 落盘新标记 → 按注册顺序同步通知订阅者 → 上报恰好一个授权事件 →
//! 将新状态作为操作派发给管线。订阅者观察到的存储标记因此总已反映新状态。
//!
//! 平台重复回报同一授权状态（系统常见行为）在比对后短路为空操作，
//! 不产生重复事件与重复通知。比对与落盘在存储的一次原子读改写内
//! 完成，并发到达的相同回报至多一次产生副作用。
//!
use crate::pipeline::Pipeline;
use optisync_domain::error::SyncResult;
use optisync_domain::event::{CoreEventFactory, CoreEventKind};
use optisync_domain::operation::{Operation, OptStatus};
use optisync_domain::storage::{Storage, StorageExt};
use std::sync::Arc;
use tracing::{debug, info};

/// 授权状态订阅能力：状态翻转时按注册顺序同步调用
pub trait OptInOutSubscriber: Send + Sync {
    fn status_changed(&self, status: OptStatus);
}

/// 令牌请求能力：转入授权且尚无令牌时触发平台获取路径（即发即忘）
pub trait TokenRequester: Send + Sync {
    fn request_token(&self);
}

pub struct OptInService {
    storage: Arc<dyn Storage>,
    pipeline: Arc<Pipeline>,
    factory: Arc<CoreEventFactory>,
    subscribers: Vec<Arc<dyn OptInOutSubscriber>>,
    token_requester: Option<Arc<dyn TokenRequester>>,
}

impl OptInService {
    pub fn new(
        storage: Arc<dyn Storage>,
        pipeline: Arc<Pipeline>,
        factory: Arc<CoreEventFactory>,
        subscribers: Vec<Arc<dyn OptInOutSubscriber>>,
        token_requester: Option<Arc<dyn TokenRequester>>,
    ) -> Self {
        Self {
            storage,
            pipeline,
            factory,
            subscribers,
            token_requester,
        }
    }

    /// 平台授权结果到达
    pub fn set_authorization(&self, granted: bool) -> SyncResult<()> {
        self.did_push_authorization(OptStatus::from_granted(granted))
    }

    /// 处理授权状态变化
    pub fn did_push_authorization(&self, status: OptStatus) -> SyncResult<()> {
        self.request_token_if_needed(status);

        let previous = self.storage.replace_opt_flag(status.as_flag());
        if previous == Some(status.as_flag()) {
            debug!(?status, "authorization status unchanged, nothing to do");
            return Ok(());
        }

        info!(?status, "notification authorization changed");

        for subscriber in &self.subscribers {
            subscriber.status_changed(status);
        }

        let kind = match status {
            OptStatus::OptIn => CoreEventKind::OptipushOptIn,
            OptStatus::OptOut => CoreEventKind::OptipushOptOut,
        };
        let event = self.factory.create(kind)?;
        self.pipeline.dispatch(Operation::Report(vec![event]));
        self.pipeline.dispatch(status.into());

        Ok(())
    }

    fn request_token_if_needed(&self, status: OptStatus) {
        if status != OptStatus::OptIn || self.storage.device_token().is_some() {
            return;
        }
        if let Some(requester) = &self.token_requester {
            requester.request_token();
        }
    }
}
