use super::Serializer;
use crate::error::{TelemetryError, TelemetryResult};
use crate::event::EventRecord;

/// JSON 序列化：`{"events": [ ... ]}`，每个事件独占一行
#[derive(Debug, Default)]
pub struct JsonSerializer {
    wrote_first: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Serializer for JsonSerializer {
    fn starting_fragment(&self) -> &str {
        "{\n\"events\": [\n"
    }

    fn serialize(&mut self, record: &EventRecord) -> TelemetryResult<String> {
        let body = serde_json::to_string(record)
            .map_err(|err| TelemetryError::serialization(record.event_type(), err))?;

        // 数组内除首个元素外都需要前置逗号
        let fragment = if self.wrote_first {
            format!(",{body}\n")
        } else {
            format!("{body}\n")
        };
        self.wrote_first = true;

        Ok(fragment)
    }

    fn final_fragment(&self) -> &str {
        "]\n}"
    }

    fn file_extension(&self) -> &str {
        "json"
    }

    fn reset(&mut self) {
        self.wrote_first = false;
    }
}
