//! 持久化能力（Storage）
//!
//! 定义同步内核对宿主键值存储的最小依赖：类型化键、可选读取、写入，
//! 以及原子读改写（`update`）。所有跨进程存活的标记（授权标记、
//! 注册失败标记、失败客户 ID 集合、事件队列）都只经由该能力落盘；
//! 组件自身不保留持久状态副本，行动前必须重新读取。
//!
//! `update` 是并发纪律的关键：两次注册尝试竞争同一标记时，
//! 读改写必须在实现内部被串行化，避免丢失更新。
//!
use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// 持久化键（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// 访客标识（匿名身份）
    VisitorId,
    /// 客户标识（业务身份，可选）
    CustomerId,
    /// 安装标识（设备安装粒度）
    InstallationId,
    /// 平台推送令牌
    DeviceToken,
    /// 通知授权标记
    OptFlag,
    /// 最近一次 set-user 网络调用是否成功
    SettingUserSuccess,
    /// 别名绑定失败的客户 ID 集合
    FailedCustomerIds,
    /// 待发送事件队列
    EventQueue,
}

impl StorageKey {
    /// 稳定的字符串形态，供落盘实现作为物理键使用
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::VisitorId => "visitor_id",
            StorageKey::CustomerId => "customer_id",
            StorageKey::InstallationId => "installation_id",
            StorageKey::DeviceToken => "device_token",
            StorageKey::OptFlag => "opt_flag",
            StorageKey::SettingUserSuccess => "setting_user_success",
            StorageKey::FailedCustomerIds => "failed_customer_ids",
            StorageKey::EventQueue => "event_queue",
        }
    }
}

/// 持久化能力：宿主注入的键值存储
///
/// 约定：所有操作跨进程重启存活，且在并发访问下安全；
/// `update` 的读改写闭包在实现内部被串行执行。
pub trait Storage: Send + Sync {
    fn get(&self, key: StorageKey) -> Option<Value>;

    fn set(&self, key: StorageKey, value: Value);

    fn remove(&self, key: StorageKey);

    /// 原子读改写：闭包返回 `None` 表示删除该键
    fn update(&self, key: StorageKey, f: &mut dyn FnMut(Option<Value>) -> Option<Value>);
}

/// 类型化读写扩展
///
/// 读取端对畸形值取 `None`（存量数据损坏不应使内核崩溃）。
pub trait StorageExt: Storage {
    fn visitor_id(&self) -> Option<String> {
        self.get(StorageKey::VisitorId)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_visitor_id(&self, id: &str) {
        self.set(StorageKey::VisitorId, Value::String(id.to_string()));
    }

    fn customer_id(&self) -> Option<String> {
        self.get(StorageKey::CustomerId)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_customer_id(&self, id: &str) {
        self.set(StorageKey::CustomerId, Value::String(id.to_string()));
    }

    fn installation_id(&self) -> Option<String> {
        self.get(StorageKey::InstallationId)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_installation_id(&self, id: &str) {
        self.set(StorageKey::InstallationId, Value::String(id.to_string()));
    }

    fn device_token(&self) -> Option<Vec<u8>> {
        self.get(StorageKey::DeviceToken)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_device_token(&self, token: &[u8]) -> SyncResult<()> {
        let value = serde_json::to_value(token)?;
        self.set(StorageKey::DeviceToken, value);
        Ok(())
    }

    fn opt_flag(&self) -> Option<bool> {
        self.get(StorageKey::OptFlag)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_opt_flag(&self, flag: bool) {
        self.set(StorageKey::OptFlag, Value::Bool(flag));
    }

    /// 原子替换授权标记，返回替换前的值
    ///
    /// 比对与落盘在一次读改写内完成，供调用方判断状态是否真正翻转；
    /// 并发写入同一目标值时至多一方观察到翻转。
    fn replace_opt_flag(&self, flag: bool) -> Option<bool> {
        let mut previous = None;
        self.update(StorageKey::OptFlag, &mut |current| {
            previous = current.and_then(|v| serde_json::from_value(v).ok());
            Some(Value::Bool(flag))
        });
        previous
    }

    fn setting_user_success(&self) -> Option<bool> {
        self.get(StorageKey::SettingUserSuccess)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_setting_user_success(&self, success: bool) {
        self.update(StorageKey::SettingUserSuccess, &mut |_| {
            Some(Value::Bool(success))
        });
    }

    fn failed_customer_ids(&self) -> BTreeSet<String> {
        self.get(StorageKey::FailedCustomerIds)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// 向失败集合追加一个客户 ID（原子）
    fn add_failed_customer_id(&self, id: &str) {
        self.update(StorageKey::FailedCustomerIds, &mut |current| {
            let mut ids: BTreeSet<String> = current
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            ids.insert(id.to_string());
            serde_json::to_value(&ids).ok()
        });
    }

    /// 从失败集合移除一个客户 ID（原子，逐个成功逐个移除）
    fn remove_failed_customer_id(&self, id: &str) {
        self.update(StorageKey::FailedCustomerIds, &mut |current| {
            let mut ids: BTreeSet<String> = current
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            ids.remove(id);
            serde_json::to_value(&ids).ok()
        });
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// 内存版存储实现
///
/// 满足 `Storage` 契约的参考实现，锁内执行 `update` 闭包以保证读改写原子性。
/// 典型用途：测试环境、示例与本地开发；真实宿主应注入落盘实现。
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<HashMap<StorageKey, Value>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: StorageKey) -> Option<Value> {
        self.inner.lock().expect("storage lock").get(&key).cloned()
    }

    fn set(&self, key: StorageKey, value: Value) {
        self.inner.lock().expect("storage lock").insert(key, value);
    }

    fn remove(&self, key: StorageKey) {
        self.inner.lock().expect("storage lock").remove(&key);
    }

    fn update(&self, key: StorageKey, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) {
        let mut guard = self.inner.lock().expect("storage lock");
        let current = guard.get(&key).cloned();
        match f(current) {
            Some(next) => {
                guard.insert(key, next);
            }
            None => {
                guard.remove(&key);
            }
        }
    }
}

/// 安装标识生成器
///
/// 进程启动时调用一次：若尚无安装标识则生成并持久化一个新的 UUID。
pub struct InstallationIdGenerator<S: Storage + ?Sized> {
    storage: std::sync::Arc<S>,
}

impl<S: Storage + ?Sized> InstallationIdGenerator<S> {
    pub fn new(storage: std::sync::Arc<S>) -> Self {
        Self { storage }
    }

    pub fn generate(&self) -> SyncResult<String> {
        if let Some(existing) = self.storage.installation_id() {
            return Ok(existing);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.storage.set_installation_id(&id);
        Ok(id)
    }
}

/// 读取必需的访客标识，缺失视为前置状态不一致
pub fn require_visitor_id(storage: &dyn Storage) -> SyncResult<String> {
    storage
        .visitor_id()
        .ok_or_else(|| SyncError::state_inconsistency("visitor id is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_round_trip() {
        let storage = InMemoryStorage::new();
        storage.set_visitor_id("v-1");
        storage.set_customer_id("c-1");
        storage.set_opt_flag(true);
        storage.set_device_token(&[1, 2, 3]).unwrap();

        assert_eq!(storage.visitor_id().as_deref(), Some("v-1"));
        assert_eq!(storage.customer_id().as_deref(), Some("c-1"));
        assert_eq!(storage.opt_flag(), Some(true));
        assert_eq!(storage.device_token(), Some(vec![1, 2, 3]));
        assert_eq!(storage.setting_user_success(), None);
    }

    #[test]
    fn failed_customer_ids_partial_mutation() {
        let storage = InMemoryStorage::new();
        storage.add_failed_customer_id("a");
        storage.add_failed_customer_id("b");
        storage.remove_failed_customer_id("a");

        let ids = storage.failed_customer_ids();
        assert_eq!(ids, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn replace_opt_flag_reports_previous_value() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.replace_opt_flag(true), None);
        assert_eq!(storage.replace_opt_flag(true), Some(true));
        assert_eq!(storage.replace_opt_flag(false), Some(true));
        assert_eq!(storage.opt_flag(), Some(false));
    }

    #[test]
    fn malformed_value_reads_as_none() {
        let storage = InMemoryStorage::new();
        storage.set(StorageKey::OptFlag, Value::String("not-a-bool".into()));
        assert_eq!(storage.opt_flag(), None);
    }

    #[test]
    fn installation_id_generated_once() {
        let storage = std::sync::Arc::new(InMemoryStorage::new());
        let generator = InstallationIdGenerator::new(storage.clone());
        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.installation_id(), Some(first));
    }
}
