//! 核心事件工厂（CoreEventFactory）
//!
//! 生产内核自身的领域事件：授权开/关、应用打开、用户绑定。
//! 事件名与属性集合固定，属性值在创建时从存储重读。
//!
use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::storage::{Storage, StorageExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const OPT_IN_EVENT_NAME: &str = "optipush_opt_in";
pub const OPT_OUT_EVENT_NAME: &str = "optipush_opt_out";
pub const APP_OPEN_EVENT_NAME: &str = "app_open";
pub const SET_USER_ID_EVENT_NAME: &str = "set_user_id";

/// 内核事件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEventKind {
    OptipushOptIn,
    OptipushOptOut,
    AppOpen,
    SetUserId,
}

pub struct CoreEventFactory {
    storage: Arc<dyn Storage>,
    app_namespace: String,
}

impl CoreEventFactory {
    pub fn new(storage: Arc<dyn Storage>, app_namespace: impl Into<String>) -> Self {
        Self {
            storage,
            app_namespace: app_namespace.into(),
        }
    }

    pub fn create(&self, kind: CoreEventKind) -> SyncResult<Event> {
        match kind {
            CoreEventKind::OptipushOptIn => self.opt_event(OPT_IN_EVENT_NAME),
            CoreEventKind::OptipushOptOut => self.opt_event(OPT_OUT_EVENT_NAME),
            CoreEventKind::AppOpen => self.app_open(),
            CoreEventKind::SetUserId => self.set_user_id(),
        }
    }

    fn base_attributes(&self) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "app_ns".to_string(),
            Value::String(self.app_namespace.clone()),
        );
        attributes
    }

    fn opt_event(&self, name: &str) -> SyncResult<Event> {
        Ok(Event::builder()
            .name(name.to_string())
            .attributes(self.base_attributes())
            .build())
    }

    fn app_open(&self) -> SyncResult<Event> {
        let mut attributes = self.base_attributes();
        if let Some(customer) = self.storage.customer_id() {
            attributes.insert("user_id".to_string(), Value::String(customer));
        }
        Ok(Event::builder()
            .name(APP_OPEN_EVENT_NAME.to_string())
            .attributes(attributes)
            .build())
    }

    fn set_user_id(&self) -> SyncResult<Event> {
        let user_id = self.storage.customer_id().ok_or_else(|| {
            SyncError::state_inconsistency("customer id is required for a set-user event")
        })?;
        let mut attributes = self.base_attributes();
        attributes.insert("user_id".to_string(), Value::String(user_id));
        if let Some(visitor) = self.storage.visitor_id() {
            attributes.insert("original_visitor_id".to_string(), Value::String(visitor));
        }
        Ok(Event::builder()
            .name(SET_USER_ID_EVENT_NAME.to_string())
            .attributes(attributes)
            .build())
    }
}
