//! 序列化格式（Serializer）
//!
//! 将事件快照转换为目标格式的片段，并维护最小的成帧状态：
//! - `starting_fragment` / `final_fragment`：文档的开头与结尾；
//! - `serialize`：单个事件的片段，首个元素之后的片段负责自带分隔符；
//! - `reset`：按批成帧时重新开始首元素计数。
//!
//! 成帧状态只在序列化成功后推进，失败的事件被跳过时文档仍保持平衡。
//!
mod json;
mod xml;

pub use json::JsonSerializer;
pub use xml::XmlSerializer;

use crate::{config::OutputFormat, error::TelemetryResult, event::EventRecord};

pub trait Serializer: Send {
    fn starting_fragment(&self) -> &str;

    fn serialize(&mut self, record: &EventRecord) -> TelemetryResult<String>;

    fn final_fragment(&self) -> &str;

    /// 文件扩展名（不含 `.`）
    fn file_extension(&self) -> &str;

    fn reset(&mut self) {}
}

/// 按配置的输出格式选择序列化实现
pub fn serializer_for(format: OutputFormat) -> Box<dyn Serializer> {
    match format {
        OutputFormat::Json => Box::new(JsonSerializer::new()),
        OutputFormat::Xml => Box::new(XmlSerializer::new()),
    }
}
