//! 事件准入（EventFilter）
//!
//! 每次提交前按事件类型查询是否启用：
//! - `EventRegistry`：仅启用清单中 `active = true` 的事件，未出现的事件视为关闭；
//! - `AllowAll`：未提供注册表时的宽松策略，放行全部事件。
//!
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub trait EventFilter: Send + Sync {
    fn is_active(&self, event_type: &str) -> bool;
}

/// 放行全部事件
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl EventFilter for AllowAll {
    fn is_active(&self, _event_type: &str) -> bool {
        true
    }
}

/// 注册表中的一项：事件类型与是否启用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventActivation {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl EventActivation {
    pub fn new(name: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            active,
        }
    }
}

/// 初始化后只读的启用事件集合
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    active: HashSet<String>,
}

impl EventRegistry {
    pub fn new(entries: impl IntoIterator<Item = EventActivation>) -> Self {
        entries.into_iter().collect()
    }

    /// 由启用的事件类型直接构建
    pub fn enabling<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            active: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl FromIterator<EventActivation> for EventRegistry {
    fn from_iter<T: IntoIterator<Item = EventActivation>>(iter: T) -> Self {
        Self {
            active: iter
                .into_iter()
                .filter(|entry| entry.active)
                .map(|entry| entry.name)
                .collect(),
        }
    }
}

impl EventFilter for EventRegistry {
    fn is_active(&self, event_type: &str) -> bool {
        self.active.contains(event_type)
    }
}
