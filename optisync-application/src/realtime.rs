//! 实时组件（Realtime）
//!
//! 将标记为实时的上报事件经专属网关即时发送，保持入参顺序。
//! 实时通道是尽力而为：失败在管线边界记录，不入队、不重试——
//! 持久化保证由事件流一侧负责。配置将实时事件改经事件流时，
//! 本组件退化为策略性空操作，避免重复发送。
//!
use crate::config::SyncConfig;
use crate::pipeline::Component;
use async_trait::async_trait;
use optisync_domain::error::SyncResult;
use optisync_domain::event::{Event, WireEvent, WireEventBuilder};
use optisync_domain::networking::EventNetworking;
use optisync_domain::operation::Operation;
use std::sync::Arc;
use tracing::debug;

pub struct RealtimeComponent {
    builder: Arc<WireEventBuilder>,
    networking: Arc<dyn EventNetworking>,
    config: SyncConfig,
}

impl RealtimeComponent {
    pub fn new(
        builder: Arc<WireEventBuilder>,
        networking: Arc<dyn EventNetworking>,
        config: SyncConfig,
    ) -> Self {
        Self {
            builder,
            networking,
            config,
        }
    }

    async fn report(&self, events: &[Event]) -> SyncResult<()> {
        if self.config.realtime_through_stream {
            debug!("realtime events routed through the stream queue, nothing to do");
            return Ok(());
        }

        let wired: Vec<WireEvent> = self
            .builder
            .build_batch(events)?
            .into_iter()
            .filter(WireEvent::realtime)
            .collect();
        if wired.is_empty() {
            return Ok(());
        }
        self.networking.send_events(&wired).await
    }
}

#[async_trait]
impl Component for RealtimeComponent {
    fn name(&self) -> &str {
        "realtime"
    }

    fn cares_about(&self, operation: &Operation) -> bool {
        self.config.realtime_enabled && matches!(operation, Operation::Report(_))
    }

    async fn handle(&self, operation: &Operation) -> SyncResult<()> {
        match operation {
            Operation::Report(events) => self.report(events).await,
            Operation::SetUserId(_)
            | Operation::OptIn
            | Operation::OptOut
            | Operation::DeviceToken(_)
            | Operation::PerformRegistration
            | Operation::SubscribeToTopic(_)
            | Operation::UnsubscribeFromTopic(_)
            | Operation::AppOpen => Ok(()),
        }
    }
}
