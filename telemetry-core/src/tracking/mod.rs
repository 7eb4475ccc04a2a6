//! 事件跟踪：队列、周期调度与刷新编排
//!
//! - `EventQueue`：生产者与刷新循环之间的共享信箱；
//! - `PersistentEventScheduler`：周期事件的等待与重复触发；
//! - `FlushPipeline`：序列化与落盘；
//! - `Tracker`：持有上述组件与两个后台循环的生命周期，对外提供提交接口。
//!
mod pipeline;
mod queue;
mod scheduler;
mod tracker;

pub use pipeline::FlushPipeline;
pub use queue::EventQueue;
pub use scheduler::PersistentEventScheduler;
pub use tracker::{Tracker, TrackerSetup, TrackerSetupBuilder};
