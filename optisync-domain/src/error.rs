//! 同步核心统一错误定义
//!
//! 聚焦网络瞬时失败、不支持的操作、状态不一致与持久化失败的最小必要集合，
//! 便于在各实现层统一转换为 `SyncError`。
//!
use thiserror::Error;

/// 统一错误类型（同步内核最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },

    // --- 网络（瞬时，可重试） ---
    #[error("network error: {reason}")]
    Network { reason: String },

    // --- 操作不被支持（丢弃，不重试） ---
    #[error("unsupported operation: {reason}")]
    Unsupported { reason: String },

    // --- 前置状态缺失（推迟到状态就绪） ---
    #[error("state inconsistency: {reason}")]
    StateInconsistency { reason: String },

    // --- 持久化 ---
    #[error("storage error: {reason}")]
    Storage { reason: String },
}

impl SyncError {
    pub fn network(reason: impl Into<String>) -> Self {
        SyncError::Network {
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        SyncError::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn state_inconsistency(reason: impl Into<String>) -> Self {
        SyncError::StateInconsistency {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        SyncError::Storage {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type SyncResult<T> = Result<T, SyncError>;

impl From<uuid::Error> for SyncError {
    fn from(err: uuid::Error) -> Self {
        SyncError::Parse {
            reason: err.to_string(),
        }
    }
}
