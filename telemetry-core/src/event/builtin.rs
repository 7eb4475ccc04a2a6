//! 内置事件
//!
//! - `SessionStart` / `SessionEnd`：Tracker 在启动与关闭时自动提交的会话标记；
//! - `SceneChange`、`LevelEvent`：交互式应用中最常见的流程事件；
//! - `SampledEvent`：以闭包作为数据采集回调的周期事件。
//!
use super::{PersistentEvent, TrackerEvent, fields_of};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

pub const SESSION_START: &str = "SessionStart";
pub const SESSION_END: &str = "SessionEnd";

/// 会话开始标记
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStart;

impl TrackerEvent for SessionStart {
    fn event_type(&self) -> &str {
        SESSION_START
    }
}

/// 会话结束标记
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionEnd;

impl TrackerEvent for SessionEnd {
    fn event_type(&self) -> &str {
        SESSION_END
    }
}

/// 场景切换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneChange {
    old_scene: String,
    new_scene: String,
}

impl SceneChange {
    pub fn new(old_scene: impl Into<String>, new_scene: impl Into<String>) -> Self {
        Self {
            old_scene: old_scene.into(),
            new_scene: new_scene.into(),
        }
    }
}

impl TrackerEvent for SceneChange {
    fn event_type(&self) -> &str {
        "SceneChange"
    }

    fn fields(&self) -> Map<String, Value> {
        fields_of(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelAction {
    Start,
    End,
    Pause,
    Unpause,
    Restart,
}

impl LevelAction {
    pub fn event_type(self) -> &'static str {
        match self {
            LevelAction::Start => "LevelStart",
            LevelAction::End => "LevelEnd",
            LevelAction::Pause => "LevelPause",
            LevelAction::Unpause => "LevelUnpause",
            LevelAction::Restart => "LevelRestart",
        }
    }
}

/// 关卡流程事件，事件类型由 `LevelAction` 决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelEvent {
    #[serde(skip_serializing)]
    action: LevelAction,
    level_name: String,
}

impl LevelEvent {
    pub fn new(action: LevelAction, level_name: impl Into<String>) -> Self {
        Self {
            action,
            level_name: level_name.into(),
        }
    }

    pub fn start(level_name: impl Into<String>) -> Self {
        Self::new(LevelAction::Start, level_name)
    }

    pub fn end(level_name: impl Into<String>) -> Self {
        Self::new(LevelAction::End, level_name)
    }

    pub fn pause(level_name: impl Into<String>) -> Self {
        Self::new(LevelAction::Pause, level_name)
    }

    pub fn unpause(level_name: impl Into<String>) -> Self {
        Self::new(LevelAction::Unpause, level_name)
    }

    pub fn restart(level_name: impl Into<String>) -> Self {
        Self::new(LevelAction::Restart, level_name)
    }

    pub fn action(&self) -> LevelAction {
        self.action
    }
}

impl TrackerEvent for LevelEvent {
    fn event_type(&self) -> &str {
        self.action.event_type()
    }

    fn fields(&self) -> Map<String, Value> {
        fields_of(self)
    }
}

type Sampler = Box<dyn FnMut() -> Map<String, Value> + Send + Sync>;

/// 采样型周期事件
///
/// 每次触发前调用采样闭包，将其返回值作为本次快照的附加字段。
pub struct SampledEvent {
    event_type: String,
    period: Duration,
    sampler: Sampler,
    latest: Map<String, Value>,
}

impl SampledEvent {
    pub fn new<F, T>(event_type: impl Into<String>, period: Duration, mut sample: F) -> Self
    where
        F: FnMut() -> T + Send + Sync + 'static,
        T: Serialize,
    {
        Self {
            event_type: event_type.into(),
            period,
            sampler: Box::new(move || fields_of(&sample())),
            latest: Map::new(),
        }
    }
}

impl fmt::Debug for SampledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampledEvent")
            .field("event_type", &self.event_type)
            .field("period", &self.period)
            .field("latest", &self.latest)
            .finish_non_exhaustive()
    }
}

impl TrackerEvent for SampledEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn fields(&self) -> Map<String, Value> {
        self.latest.clone()
    }
}

impl PersistentEvent for SampledEvent {
    fn period(&self) -> Duration {
        self.period
    }

    fn collect_data(&mut self) {
        self.latest = (self.sampler)();
    }
}
