//! 同步核心编排层（optisync-application）
//!
//! 在 `optisync-domain` 的契约之上提供运行时编排：
//! - 分发管线（`pipeline`）：将一次操作按注册顺序交给各组件，隔离单组件失败
//! - 注册器（`registrar`）：身份/安装记录的持久化重试状态机
//! - 推送组件（`push`）：令牌落盘、注册转发与主题订阅
//! - 授权服务（`optin`）：授权状态翻转、订阅者通知与事件上报
//! - 事件队列与发送端（`queue`/`tracker`）：有序、至少一次的批量投递
//! - 实时组件（`realtime`）：实时事件的旁路即时发送
//!
//! 典型用法：
//! 1. 注入宿主的 `Storage` 与两条网络能力实现；
//! 2. 构建注册器、跟踪器等组件并注册到 `Pipeline`；
//! 3. 触发源构造 `Operation` 并调用 `dispatch`，一次性上报路径使用
//!    `dispatch_tracked` 以受限宽限期等待终态完成。
//!
pub mod config;
pub mod error;
pub mod optin;
pub mod pipeline;
pub mod push;
pub mod queue;
pub mod realtime;
pub mod registrar;
pub mod tracker;
