//! 注册器（Registrar）
//!
//! 维护远端身份/安装记录与本地状态的收敛：
//! - `set_user` 绑定访客/客户身份；每次尝试后持久化成功标记，
//!   失败只记录、不上抛（调用可能来自后台投递路径，不允许打断触发方）；
//! - `add_user_alias` 逐个别名独立结算，失败 ID 留在持久化集合中等待重试；
//! - `retry_failed_operations_if_exist` 在每次进程启动时补偿上一生命周期
//!   留下的未完成工作，先 `set_user` 后别名（依赖序固定）。
//!
//! 所有失败标记与失败集合的变更都经由存储的原子读改写落盘，
//! 并发注册尝试竞争时不会丢失更新。
//!
use optisync_domain::error::{SyncError, SyncResult};
use optisync_domain::networking::{
    AddAliasPayload, RegistrarNetworking, RegistrationRequest, SetUserPayload,
};
use optisync_domain::storage::{Storage, StorageExt, require_visitor_id};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 注册子操作（封闭变体）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOp {
    /// 绑定访客/客户身份到远端记录
    SetUser,
    /// 将一组客户 ID 作为别名链接到远端记录
    AddUserAlias(Vec<String>),
}

pub struct Registrar {
    storage: Arc<dyn Storage>,
    networking: Arc<dyn RegistrarNetworking>,
}

impl Registrar {
    pub fn new(storage: Arc<dyn Storage>, networking: Arc<dyn RegistrarNetworking>) -> Self {
        Self {
            storage,
            networking,
        }
    }

    pub async fn handle(&self, op: RegistrationOp) {
        match op {
            RegistrationOp::SetUser => self.set_user().await,
            RegistrationOp::AddUserAlias(aliases) => self.add_user_alias(&aliases).await,
        }
    }

    /// 本地用户标识变更
    ///
    /// 先持久化新身份，再决定到期的子操作：首次绑定走 `set_user`；
    /// 后续切换将新 ID 作为别名链接。无令牌时只落盘、推迟网络调用，
    /// 令牌到达后的 `set_user` 会带上当前身份。
    pub async fn set_user_id(&self, customer_id: &str) {
        let previous = self.storage.customer_id();
        if previous.as_deref() == Some(customer_id) {
            debug!(customer_id, "identity unchanged, nothing to register");
            return;
        }
        self.storage.set_customer_id(customer_id);

        if self.storage.device_token().is_none() {
            debug!(customer_id, "no device token yet, registration deferred");
            return;
        }

        match previous {
            // 首次绑定的 set_user 本身即是补偿，无需先行重试
            None => self.set_user().await,
            Some(_) => {
                // 上一次 set_user 失败时必须先补齐，别名链接依赖已收敛的记录
                if self.storage.setting_user_success() == Some(false) {
                    self.set_user().await;
                }
                self.add_user_alias(&[customer_id.to_string()]).await;
            }
        }
    }

    /// 发起 set-user 网络调用并持久化结果标记
    ///
    /// 对已收敛身份的重复发送是服务端视角的无害空操作，放心重发。
    pub async fn set_user(&self) {
        let payload = match self.build_set_user_payload() {
            Ok(payload) => payload,
            Err(err) => {
                debug!(%err, "set-user deferred until prerequisite state exists");
                return;
            }
        };

        match self
            .networking
            .send(RegistrationRequest::SetUser(payload))
            .await
        {
            Ok(()) => {
                self.storage.set_setting_user_success(true);
                info!("set-user registration succeeded");
            }
            Err(err) => {
                self.storage.set_setting_user_success(false);
                warn!(%err, "set-user registration failed, will retry on next opportunity");
            }
        }
    }

    /// 逐个别名独立链接；失败 ID 进入持久化失败集合，成功则移除
    pub async fn add_user_alias(&self, aliases: &[String]) {
        let Some(customer_id) = self.storage.customer_id() else {
            debug!("add-user-alias deferred: no customer id bound yet");
            return;
        };

        for alias in aliases {
            let request = RegistrationRequest::AddUserAlias(AddAliasPayload {
                customer_id: customer_id.clone(),
                alias: alias.clone(),
            });
            match self.networking.send(request).await {
                Ok(()) => {
                    self.storage.remove_failed_customer_id(alias);
                    debug!(alias, "user alias linked");
                }
                Err(err) => {
                    self.storage.add_failed_customer_id(alias);
                    warn!(alias, %err, "user alias linking failed, id kept for retry");
                }
            }
        }
    }

    /// 授权开启：标记先落盘，持有令牌时再重发注册（顺序不可倒置）
    pub async fn opt_in(&self) {
        self.storage.set_opt_flag(true);
        if self.storage.device_token().is_some() {
            self.set_user().await;
        }
    }

    /// 授权关闭：同 `opt_in`，目标状态相反
    pub async fn opt_out(&self) {
        self.storage.set_opt_flag(false);
        if self.storage.device_token().is_some() {
            self.set_user().await;
        }
    }

    /// 补偿上一进程生命周期留下的未完成注册工作
    ///
    /// 每次构造后调用一次。读取持久化失败标记：`set_user` 未成功则重发；
    /// 失败集合中的每个客户 ID 独立重试，单个成功即从集合移除，
    /// 部分进展不会被整体失败冲掉。
    pub async fn retry_failed_operations_if_exist(&self) {
        if self.storage.setting_user_success() == Some(false) {
            info!("retrying failed set-user from a previous lifetime");
            self.set_user().await;
        }

        let failed: Vec<String> = self.storage.failed_customer_ids().into_iter().collect();
        if !failed.is_empty() {
            info!(count = failed.len(), "retrying failed user aliases");
            self.add_user_alias(&failed).await;
        }
    }

    fn build_set_user_payload(&self) -> SyncResult<SetUserPayload> {
        let visitor_id = require_visitor_id(self.storage.as_ref())?;
        let installation_id = self.storage.installation_id().ok_or_else(|| {
            SyncError::state_inconsistency("installation id is not set")
        })?;
        Ok(SetUserPayload {
            visitor_id,
            customer_id: self.storage.customer_id(),
            installation_id,
            device_token: self.storage.device_token(),
            opt_in: self.storage.opt_flag().unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use optisync_domain::error::{SyncError, SyncResult};
    use optisync_domain::storage::InMemoryStorage;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// 可编程网络桩：按请求变体决定成败并记录全部请求
    #[derive(Default)]
    struct SpyNetworking {
        requests: Mutex<Vec<RegistrationRequest>>,
        fail_set_user: bool,
        fail_aliases: BTreeSet<String>,
    }

    #[async_trait]
    impl RegistrarNetworking for SpyNetworking {
        async fn send(&self, request: RegistrationRequest) -> SyncResult<()> {
            self.requests.lock().unwrap().push(request.clone());
            match request {
                RegistrationRequest::SetUser(_) if self.fail_set_user => {
                    Err(SyncError::network("set-user refused"))
                }
                RegistrationRequest::AddUserAlias(payload)
                    if self.fail_aliases.contains(&payload.alias) =>
                {
                    Err(SyncError::network("alias refused"))
                }
                _ => Ok(()),
            }
        }
    }

    impl SpyNetworking {
        fn sent_kinds(&self) -> Vec<&'static str> {
            self.requests.lock().unwrap().iter().map(|r| r.kind()).collect()
        }
    }

    fn registered_storage() -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_visitor_id("v-1");
        storage.set_installation_id("i-1");
        storage.set_device_token(&[0xAA]).unwrap();
        storage
    }

    #[tokio::test]
    async fn set_user_success_persists_flag() {
        let storage = registered_storage();
        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());

        registrar.handle(RegistrationOp::SetUser).await;

        assert_eq!(networking.sent_kinds(), vec!["set_user"]);
        assert_eq!(storage.setting_user_success(), Some(true));
    }

    #[tokio::test]
    async fn set_user_failure_is_recorded_not_raised() {
        let storage = registered_storage();
        let networking = Arc::new(SpyNetworking {
            fail_set_user: true,
            ..Default::default()
        });
        let registrar = Registrar::new(storage.clone(), networking.clone());

        registrar.handle(RegistrationOp::SetUser).await;

        assert_eq!(storage.setting_user_success(), Some(false));
    }

    #[tokio::test]
    async fn set_user_without_visitor_is_deferred() {
        let storage = Arc::new(InMemoryStorage::new());
        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());

        registrar.set_user().await;

        assert!(networking.requests.lock().unwrap().is_empty());
        assert_eq!(storage.setting_user_success(), None);
    }

    #[tokio::test]
    async fn retry_reissues_set_user_exactly_once_and_converges() {
        let storage = registered_storage();
        storage.set_customer_id("c-1");
        storage.set_setting_user_success(false);

        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.retry_failed_operations_if_exist().await;

        assert_eq!(networking.sent_kinds(), vec!["set_user"]);
        assert_eq!(storage.setting_user_success(), Some(true));

        // 再次“重启”：已收敛，不应再发任何请求
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.retry_failed_operations_if_exist().await;
        assert_eq!(networking.sent_kinds(), vec!["set_user"]);
    }

    #[tokio::test]
    async fn partial_alias_retry_keeps_unresolved_ids() {
        let storage = registered_storage();
        storage.set_customer_id("c-1");
        storage.add_failed_customer_id("a");
        storage.add_failed_customer_id("b");

        let networking = Arc::new(SpyNetworking {
            fail_aliases: BTreeSet::from(["b".to_string()]),
            ..Default::default()
        });
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.retry_failed_operations_if_exist().await;

        assert_eq!(
            storage.failed_customer_ids(),
            BTreeSet::from(["b".to_string()])
        );
    }

    #[tokio::test]
    async fn retry_orders_set_user_before_aliases() {
        let storage = registered_storage();
        storage.set_customer_id("c-1");
        storage.set_setting_user_success(false);
        storage.add_failed_customer_id("a");

        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.retry_failed_operations_if_exist().await;

        assert_eq!(networking.sent_kinds(), vec!["set_user", "add_user_alias"]);
        assert!(storage.failed_customer_ids().is_empty());
    }

    #[tokio::test]
    async fn identity_switch_links_alias() {
        let storage = registered_storage();
        storage.set_customer_id("c-old");
        storage.set_setting_user_success(true);

        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.set_user_id("c-new").await;

        assert_eq!(storage.customer_id().as_deref(), Some("c-new"));
        assert_eq!(networking.sent_kinds(), vec!["add_user_alias"]);
    }

    #[tokio::test]
    async fn first_bind_after_failed_set_user_sends_it_once() {
        let storage = registered_storage();
        storage.set_setting_user_success(false);

        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.set_user_id("c-1").await;

        assert_eq!(networking.sent_kinds(), vec!["set_user"]);
        assert_eq!(storage.setting_user_success(), Some(true));
    }

    #[tokio::test]
    async fn identity_switch_retries_failed_set_user_before_alias() {
        let storage = registered_storage();
        storage.set_customer_id("c-old");
        storage.set_setting_user_success(false);

        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());
        registrar.set_user_id("c-new").await;

        assert_eq!(networking.sent_kinds(), vec!["set_user", "add_user_alias"]);
    }

    #[tokio::test]
    async fn first_bind_issues_set_user() {
        let storage = registered_storage();
        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());

        registrar.set_user_id("c-1").await;

        assert_eq!(networking.sent_kinds(), vec!["set_user"]);
    }

    #[tokio::test]
    async fn opt_toggle_persists_before_reissuing_registration() {
        let storage = registered_storage();
        let networking = Arc::new(SpyNetworking::default());
        let registrar = Registrar::new(storage.clone(), networking.clone());

        registrar.opt_in().await;

        assert_eq!(storage.opt_flag(), Some(true));
        let requests = networking.requests.lock().unwrap();
        match &requests[0] {
            RegistrationRequest::SetUser(payload) => assert!(payload.opt_in),
            other => panic!("expected set-user, got {other:?}"),
        }
    }
}
