//! 推送组件（PushComponent）
//!
//! 消费身份/授权/令牌类操作并转发给注册器；主题订阅转发给注入的
//! 主题登记能力。组件构造即补偿上一生命周期遗留的失败注册。
//! 上一次 set-user 尚未成功时，主题订阅被推迟——依赖未收敛记录的
//! 操作不视为安全。
//!
use crate::pipeline::Component;
use crate::registrar::{Registrar, RegistrationOp};
use async_trait::async_trait;
use optisync_domain::error::SyncResult;
use optisync_domain::operation::Operation;
use optisync_domain::storage::{Storage, StorageExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// 主题登记能力：远端主题的订阅与退订（即发即忘）
#[async_trait]
pub trait TopicRegistry: Send + Sync {
    async fn subscribe(&self, topic: &str) -> SyncResult<()>;
    async fn unsubscribe(&self, topic: &str) -> SyncResult<()>;
}

pub struct PushComponent {
    storage: Arc<dyn Storage>,
    registrar: Arc<Registrar>,
    topics: Arc<dyn TopicRegistry>,
}

impl PushComponent {
    /// 构造并立即补偿遗留的失败注册（每次进程启动执行一次）
    pub async fn start(
        storage: Arc<dyn Storage>,
        registrar: Arc<Registrar>,
        topics: Arc<dyn TopicRegistry>,
    ) -> Self {
        registrar.retry_failed_operations_if_exist().await;
        debug!("push component initialized");
        Self {
            storage,
            registrar,
            topics,
        }
    }

    fn registered(&self) -> bool {
        self.storage.setting_user_success() != Some(false)
    }
}

#[async_trait]
impl Component for PushComponent {
    fn name(&self) -> &str {
        "push"
    }

    fn cares_about(&self, operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::SetUserId(_)
                | Operation::OptIn
                | Operation::OptOut
                | Operation::DeviceToken(_)
                | Operation::PerformRegistration
                | Operation::SubscribeToTopic(_)
                | Operation::UnsubscribeFromTopic(_)
        )
    }

    async fn handle(&self, operation: &Operation) -> SyncResult<()> {
        match operation {
            Operation::DeviceToken(token) => {
                self.storage.set_device_token(token)?;
                self.registrar.handle(RegistrationOp::SetUser).await;
                Ok(())
            }
            Operation::SetUserId(customer_id) => {
                self.registrar.set_user_id(customer_id).await;
                Ok(())
            }
            Operation::OptIn => {
                self.registrar.opt_in().await;
                Ok(())
            }
            Operation::OptOut => {
                self.registrar.opt_out().await;
                Ok(())
            }
            Operation::PerformRegistration => {
                self.registrar.handle(RegistrationOp::SetUser).await;
                Ok(())
            }
            Operation::SubscribeToTopic(topic) => {
                if !self.registered() {
                    warn!(topic, "subscription deferred until registration converges");
                    return Ok(());
                }
                self.topics.subscribe(topic).await
            }
            Operation::UnsubscribeFromTopic(topic) => {
                if !self.registered() {
                    warn!(topic, "unsubscription deferred until registration converges");
                    return Ok(());
                }
                self.topics.unsubscribe(topic).await
            }
            Operation::Report(_) | Operation::AppOpen => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optisync_domain::error::{SyncError, SyncResult};
    use optisync_domain::networking::{RegistrarNetworking, RegistrationRequest};
    use optisync_domain::storage::InMemoryStorage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNetworking {
        requests: Mutex<Vec<RegistrationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl RegistrarNetworking for RecordingNetworking {
        async fn send(&self, request: RegistrationRequest) -> SyncResult<()> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                return Err(SyncError::network("refused"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTopics {
        subscribed: Mutex<Vec<String>>,
        unsubscribed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TopicRegistry for RecordingTopics {
        async fn subscribe(&self, topic: &str) -> SyncResult<()> {
            self.subscribed.lock().unwrap().push(topic.to_string());
            Ok(())
        }
        async fn unsubscribe(&self, topic: &str) -> SyncResult<()> {
            self.unsubscribed.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    async fn fixture(
        networking: Arc<RecordingNetworking>,
    ) -> (PushComponent, Arc<InMemoryStorage>, Arc<RecordingTopics>) {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_visitor_id("v-1");
        storage.set_installation_id("i-1");
        let topics = Arc::new(RecordingTopics::default());
        let registrar = Arc::new(Registrar::new(
            storage.clone() as Arc<dyn Storage>,
            networking,
        ));
        let component = PushComponent::start(
            storage.clone() as Arc<dyn Storage>,
            registrar,
            topics.clone(),
        )
        .await;
        (component, storage, topics)
    }

    #[tokio::test]
    async fn device_token_persisted_then_registered() {
        let networking = Arc::new(RecordingNetworking::default());
        let (component, storage, _topics) = fixture(networking.clone()).await;

        component
            .handle(&Operation::DeviceToken(vec![0xDE, 0xAD]))
            .await
            .unwrap();

        assert_eq!(storage.device_token(), Some(vec![0xDE, 0xAD]));
        let requests = networking.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            RegistrationRequest::SetUser(payload) => {
                assert_eq!(payload.device_token, Some(vec![0xDE, 0xAD]));
            }
            other => panic!("expected set-user, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn construction_retries_failed_registration() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_visitor_id("v-1");
        storage.set_installation_id("i-1");
        storage.set_setting_user_success(false);

        let networking = Arc::new(RecordingNetworking::default());
        let registrar = Arc::new(Registrar::new(
            storage.clone() as Arc<dyn Storage>,
            networking.clone(),
        ));
        let _component = PushComponent::start(
            storage.clone() as Arc<dyn Storage>,
            registrar,
            Arc::new(RecordingTopics::default()),
        )
        .await;

        assert_eq!(networking.requests.lock().unwrap().len(), 1);
        assert_eq!(storage.setting_user_success(), Some(true));
    }

    #[tokio::test]
    async fn topic_subscription_deferred_until_converged() {
        let networking = Arc::new(RecordingNetworking::default());
        let (component, storage, topics) = fixture(networking).await;
        storage.set_setting_user_success(false);

        component
            .handle(&Operation::SubscribeToTopic("news".to_string()))
            .await
            .unwrap();
        assert!(topics.subscribed.lock().unwrap().is_empty());

        storage.set_setting_user_success(true);
        component
            .handle(&Operation::SubscribeToTopic("news".to_string()))
            .await
            .unwrap();
        assert_eq!(*topics.subscribed.lock().unwrap(), vec!["news"]);
    }

    #[tokio::test]
    async fn unsubscribe_forwarded_to_registry() {
        let networking = Arc::new(RecordingNetworking::default());
        let (component, _storage, topics) = fixture(networking).await;

        component
            .handle(&Operation::UnsubscribeFromTopic("news".to_string()))
            .await
            .unwrap();
        assert_eq!(*topics.unsubscribed.lock().unwrap(), vec!["news"]);
    }
}
