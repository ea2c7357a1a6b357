//! 分发管线（Pipeline）
//!
//! 将一次操作按注册顺序依次交给每个关心它的组件：
//! - 单组件失败在管线边界捕获并记录，绝不阻断后续组件（失败隔离）；
//! - 组件在一次 `dispatch` 内串行调用，注册顺序即调用顺序；
//! - 默认派发不阻塞触发方；一次性上报路径使用 `dispatch_tracked`
//!   在受限宽限期内等待终态完成。
//!
use crate::error::AppError;
use async_trait::async_trait;
use bon::Builder;
use optisync_domain::error::SyncResult;
use optisync_domain::operation::Operation;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// 跟踪派发的宽限期上限，与平台授予的预算无关
pub const DISPATCH_GRACE_CEILING: Duration = Duration::from_secs(2);

/// 组件能力：消费一个操作，可能失败
///
/// `cares_about` 是调用前的过滤谓词，避免组件为不相关变体做空转。
#[async_trait]
pub trait Component: Send + Sync {
    /// 组件名（用于日志与结果归属）
    fn name(&self) -> &str;

    /// 该组件是否关心此操作变体
    fn cares_about(&self, operation: &Operation) -> bool;

    /// 处理操作
    async fn handle(&self, operation: &Operation) -> SyncResult<()>;
}

/// 一次派发中单个组件的结果
#[derive(Debug)]
pub struct ComponentOutcome {
    pub component: String,
    pub result: SyncResult<()>,
}

/// 分发管线：持有注册顺序固定的组件列表
#[derive(Builder)]
pub struct Pipeline {
    components: Vec<Arc<dyn Component>>,
}

impl Pipeline {
    /// 派发一个操作（即发即忘）
    ///
    /// 触发方不等待网络完成；组件失败仅记录日志。
    pub fn dispatch(self: &Arc<Self>, operation: Operation) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _ = pipeline.run(&operation).await;
        });
    }

    /// 派发并等待所有组件终态完成，受 `DISPATCH_GRACE_CEILING` 约束
    ///
    /// 用于必须在进程回收前等网络调用返回的一次性上报路径。
    pub async fn dispatch_tracked(
        &self,
        operation: Operation,
        budget: Duration,
    ) -> Result<Vec<ComponentOutcome>, AppError> {
        let grace = budget.min(DISPATCH_GRACE_CEILING);
        tokio::time::timeout(grace, self.run(&operation))
            .await
            .map_err(|_| AppError::GraceExceeded(grace))
    }

    async fn run(&self, operation: &Operation) -> Vec<ComponentOutcome> {
        let mut outcomes = Vec::with_capacity(self.components.len());

        for component in &self.components {
            if !component.cares_about(operation) {
                continue;
            }
            let result = component.handle(operation).await;
            match &result {
                Ok(()) => {
                    debug!(
                        component = component.name(),
                        operation = operation.kind(),
                        "component handled operation"
                    );
                }
                Err(err) => {
                    error!(
                        component = component.name(),
                        operation = operation.kind(),
                        %err,
                        "component failed, continuing with remaining components"
                    );
                }
            }
            outcomes.push(ComponentOutcome {
                component: component.name().to_string(),
                result,
            });
        }

        outcomes
    }
}
