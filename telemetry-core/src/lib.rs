//! 嵌入式遥测管线（telemetry-core）
//!
//! 为交互式应用提供埋点事件的采集、缓冲与周期落盘：
//! - 一次性事件与周期性（persistent）事件（`event`）
//! - 事件准入注册表（`filter`）
//! - 可插拔的序列化格式 JSON/XML（`serializer`）
//! - 可插拔的落盘目标：文件、HTTP、内存（`persist`）
//! - 事件队列、周期事件调度器与 Tracker 编排（`tracking`）
//! - TOML 配置（`config`）
//!
//! 典型用法：
//! 1. 通过 `TrackerConfig` 描述刷新间隔、输出格式与落盘目标；
//! 2. `Tracker::initialize(&config)` 启动刷新循环，写入会话开始标记；
//! 3. 应用侧调用 `submit` / `track_persistent` / `stop_tracking_persistent`；
//! 4. 退出前 `shutdown().await`，写入会话结束标记并完成最后一次落盘。
//!
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod persist;
pub mod serializer;
pub mod tracking;

pub use config::TrackerConfig;
pub use error::{TelemetryError, TelemetryResult};
pub use tracking::{Tracker, TrackerSetup};
