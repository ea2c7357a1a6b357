//! 事件跟踪器（Tracker）与后台发送端
//!
//! 消费上报类操作：归一化事件、按实时旁路策略过滤、入持久化队列，
//! 随后尝试即时冲刷；后台工作者按固定间隔重试残留批次。
//! 应用打开与身份绑定在此转化为内核事件后走同一上报路径。
//! 投递保证：
//! - 入队序即发送序（单消费者冲刷，批内与跨批均保序）；
//! - 批次原子：整批接受或整批留队重试（至少一次）；
//! - 发送端失败绝不越过入队调用方上抛，记录后交由重试环恢复。
//!
use crate::config::{SyncConfig, TrackerConfig};
use crate::pipeline::Component;
use crate::queue::EventQueue;
use async_trait::async_trait;
use bon::Builder;
use optisync_domain::error::SyncResult;
use optisync_domain::event::{CoreEventFactory, CoreEventKind, Event, WireEvent, WireEventBuilder};
use optisync_domain::networking::EventNetworking;
use optisync_domain::operation::Operation;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 事件跟踪器：上报路径的入队与冲刷编排
#[derive(Builder)]
pub struct Tracker {
    builder: Arc<WireEventBuilder>,
    factory: Arc<CoreEventFactory>,
    queue: Arc<dyn EventQueue>,
    networking: Arc<dyn EventNetworking>,
    #[builder(default)]
    sync_config: SyncConfig,
    #[builder(default)]
    config: TrackerConfig,
    #[builder(skip)]
    flush_lock: tokio::sync::Mutex<()>,
}

impl Tracker {
    /// 归一化并上报一组领域事件
    ///
    /// 实时旁路策略在入队前逐事件评估：实时通道启用且未改经事件流时，
    /// 实时事件归旁路通道所有，此队列必须抑制以避免重复发送。
    async fn report(&self, events: &[Event]) -> SyncResult<()> {
        let wired = self.builder.build_batch(events)?;
        let admitted: Vec<WireEvent> = wired
            .into_iter()
            .filter(|event| {
                if self.suppressed_by_realtime_bypass(event) {
                    debug!(
                        event = event.event(),
                        "realtime event owned by the bypass channel, not enqueued"
                    );
                    return false;
                }
                true
            })
            .collect();

        self.queue.enqueue(admitted);
        // 入队即成功；冲刷失败由重试环恢复，不回传调用方
        self.flush().await;
        Ok(())
    }

    fn suppressed_by_realtime_bypass(&self, event: &WireEvent) -> bool {
        event.realtime()
            && self.sync_config.realtime_enabled
            && !self.sync_config.realtime_through_stream
    }

    /// 串行冲刷：按 FIFO 分批发送，整批确认或整批留队
    pub async fn flush(&self) {
        let _guard = self.flush_lock.lock().await;

        loop {
            let batch = self.queue.first(self.config.batch_size);
            if batch.is_empty() {
                break;
            }
            match self.networking.send_events(&batch).await {
                Ok(()) => {
                    self.queue.remove(&batch);
                    debug!(count = batch.len(), "event batch delivered");
                }
                Err(err) => {
                    warn!(%err, count = batch.len(), "event batch send failed, kept for retry");
                    break;
                }
            }
        }
    }

    /// 启动后台发送工作者（每队列单实例）
    pub fn spawn_worker(self: &Arc<Self>) -> WorkerHandle {
        let token = CancellationToken::new();
        let tracker = self.clone();
        let interval = self.config.flush_interval;

        let task = tokio::spawn({
            let token = token.clone();
            async move {
                let mut ticker = time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => tracker.flush().await,
                    }
                }
            }
        });

        WorkerHandle {
            token,
            task: Some(task),
        }
    }
}

#[async_trait]
impl Component for Tracker {
    fn name(&self) -> &str {
        "tracker"
    }

    fn cares_about(&self, operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::Report(_) | Operation::AppOpen | Operation::SetUserId(_)
        )
    }

    async fn handle(&self, operation: &Operation) -> SyncResult<()> {
        match operation {
            Operation::Report(events) => self.report(events).await,
            Operation::AppOpen => {
                let event = self.factory.create(CoreEventKind::AppOpen)?;
                self.report(&[event]).await
            }
            // 身份由推送组件一侧持久化；此处仅上报绑定事件
            Operation::SetUserId(_) => {
                let event = self.factory.create(CoreEventKind::SetUserId)?;
                self.report(&[event]).await
            }
            Operation::OptIn
            | Operation::OptOut
            | Operation::DeviceToken(_)
            | Operation::PerformRegistration
            | Operation::SubscribeToTopic(_)
            | Operation::UnsubscribeFromTopic(_) => Ok(()),
        }
    }
}

/// 发送工作者句柄：用于优雅关闭与等待结束
pub struct WorkerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
