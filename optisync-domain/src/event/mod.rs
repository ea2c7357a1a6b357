//! 领域事件与线上事件（event）
//!
//! 定义触发源构造的领域事件（`Event`）、其后端就绪的归一化形态
//! （`WireEvent`）、两者之间的转换器（`WireEventBuilder`），
//! 以及内核自身事件的工厂（`CoreEventFactory`）。

mod builder;
mod domain_event;
mod factory;
mod wire;

pub use builder::WireEventBuilder;
pub use domain_event::Event;
pub use factory::{CoreEventFactory, CoreEventKind};
pub use wire::{ContextEntry, WireEvent, WireMetadata};
