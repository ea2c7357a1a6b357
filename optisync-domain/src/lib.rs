//! 同步核心领域层（optisync-domain）
//!
//! 提供客户端同步内核的共享词汇与契约，用于在应用中实现：
//! - 领域操作（`operation`）：身份变更、授权变更、令牌到达、事件上报等封闭变体
//! - 领域事件与线上事件（`event`）：事件构建、归一化与核心事件工厂
//! - 持久化能力（`storage`）：类型化键值读写与原子读改写
//! - 网络能力（`networking`）：事件批量发送与注册请求发送
//!
//! 本 crate 不绑定任何传输或存储实现，仅定义领域层接口与最小必要的错误类型，
//! 以便在不同宿主环境（内存、磁盘、远端配置等）上进行适配实现。
//!
pub mod error;
pub mod event;
pub mod networking;
pub mod operation;
pub mod storage;
