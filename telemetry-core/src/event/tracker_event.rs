use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// 埋点事件：稳定的类型标识 + 可选的附加字段
pub trait TrackerEvent: Send + Sync {
    /// 事件类型标识，同时用于注册表准入与序列化（如 `"LevelStart"`）
    fn event_type(&self) -> &str;

    /// 附加字段，序列化时与公共字段并列输出
    fn fields(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// 周期事件：按固定周期重复触发，直到被显式停止
pub trait PersistentEvent: TrackerEvent {
    /// 触发周期
    fn period(&self) -> Duration;

    /// 触发前的数据采集回调
    fn collect_data(&mut self) {}
}

/// 将可序列化的结构体转换为事件附加字段
///
/// 非对象的值会以 `value` 为键包装；序列化失败时返回空字段。
pub fn fields_of<T: Serialize + ?Sized>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(err) => {
            tracing::warn!(error = %err, "event fields could not be converted; dropping payload");
            Map::new()
        }
    }
}
