//! 事件快照（EventRecord）
//!
//! 事件在提交或周期触发的瞬间被捕获为不可变的 `EventRecord` 放入队列，
//! 刷新循环消费后即丢弃。周期事件每次触发都会生成新的快照，
//! 因而同一实例不会在队列中出现两次。
//!
use super::TrackerEvent;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 公共字段名，附加字段中的同名键会被丢弃
const RESERVED_KEYS: [&str; 3] = ["event_type", "time_stamp", "session_id"];

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 事件类型标识
    #[builder(into)]
    event_type: String,
    /// 事件发生时间（Unix 毫秒）
    #[serde(rename = "time_stamp")]
    timestamp: i64,
    /// 本次运行的会话 ID
    #[builder(into)]
    session_id: String,
    /// 附加字段
    #[serde(flatten)]
    #[builder(default)]
    fields: Map<String, Value>,
}

impl EventRecord {
    /// 在 `timestamp` 时刻捕获事件快照
    pub fn capture<E>(event: &E, timestamp: i64, session_id: &str) -> Self
    where
        E: TrackerEvent + ?Sized,
    {
        let mut fields = event.fields();
        fields.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        Self {
            event_type: event.event_type().to_string(),
            timestamp,
            session_id: session_id.to_string(),
            fields,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}
