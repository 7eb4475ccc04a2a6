use super::Serializer;
use crate::error::{TelemetryError, TelemetryResult};
use crate::event::EventRecord;
use serde_json::Value;

const TIMESTAMP_ATTR: &str = "timestamp";
const SESSION_ATTR: &str = "sessionID";

/// XML 序列化：`<events>` 下每个事件一个自闭合元素
///
/// 元素名为事件类型，时间戳、会话 ID 与附加字段均写为属性；
/// 非标量字段以紧凑 JSON 文本写入属性值。
#[derive(Debug, Default)]
pub struct XmlSerializer;

impl XmlSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for XmlSerializer {
    fn starting_fragment(&self) -> &str {
        "<events>\n"
    }

    fn serialize(&mut self, record: &EventRecord) -> TelemetryResult<String> {
        let name = record.event_type();
        if !is_xml_name(name) {
            return Err(TelemetryError::serialization(
                name,
                "event type is not a valid XML element name",
            ));
        }

        let forbidden = |key: &str, ch: char| {
            TelemetryError::serialization(
                name,
                format!("attribute `{key}` contains U+{:04X}, which XML 1.0 cannot represent", ch as u32),
            )
        };

        let mut out = format!("<{name}");
        push_attr(&mut out, TIMESTAMP_ATTR, &record.timestamp().to_string())
            .map_err(|ch| forbidden(TIMESTAMP_ATTR, ch))?;
        push_attr(&mut out, SESSION_ATTR, record.session_id())
            .map_err(|ch| forbidden(SESSION_ATTR, ch))?;

        for (key, value) in record.fields() {
            if key == TIMESTAMP_ATTR || key == SESSION_ATTR {
                continue;
            }
            if !is_xml_name(key) {
                return Err(TelemetryError::serialization(
                    name,
                    format!("field `{key}` is not a valid XML attribute name"),
                ));
            }
            push_attr(&mut out, key, &render(value)).map_err(|ch| forbidden(key, ch))?;
        }
        out.push_str("/>\n");

        Ok(out)
    }

    fn final_fragment(&self) -> &str {
        "</events>"
    }

    fn file_extension(&self) -> &str {
        "xml"
    }
}

/// 写入一个属性；值中含 XML 不允许的字符时返回该字符
fn push_attr(out: &mut String, key: &str, value: &str) -> Result<(), char> {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    escape_into(out, value)?;
    out.push('"');
    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, raw: &str) -> Result<(), char> {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c if is_forbidden(c) => return Err(c),
            c => out.push(c),
        }
    }
    Ok(())
}

/// XML 1.0 `Char` 产生式之外的字符，转义后同样非法
fn is_forbidden(ch: char) -> bool {
    ch < '\u{20}' || matches!(ch, '\u{FFFE}' | '\u{FFFF}')
}

/// ASCII 子集的 XML Name 校验
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
