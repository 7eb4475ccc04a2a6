//! 埋点事件（Event）
//!
//! 定义事件需要实现的最小接口（`TrackerEvent` / `PersistentEvent`），
//! 入队时生成的不可变快照 `EventRecord`，以及内置的系统事件。

mod builtin;
mod record;
mod tracker_event;

pub use builtin::{
    LevelAction, LevelEvent, SESSION_END, SESSION_START, SampledEvent, SceneChange, SessionEnd,
    SessionStart,
};
pub use record::EventRecord;
pub use tracker_event::{PersistentEvent, TrackerEvent, fields_of};
