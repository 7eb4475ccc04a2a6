//! 落盘目标（Persistence）
//!
//! 定义批量提交序列化片段的统一协议与内置实现：
//! - `FilePersistence`：每次运行一个文件，整场会话共用一个文档；
//! - `ServerPersistence`：每批作为独立 JSON 文档 POST 至服务端（`network` 特性）；
//! - `MemoryPersistence`：内存转录，用于测试与嵌入。
//!
//! 落盘目标由刷新循环独占（单写者），因此协议方法均接收 `&mut self`。
//!
mod file;
mod memory;
#[cfg(feature = "network")]
mod server;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
#[cfg(feature = "network")]
pub use server::ServerPersistence;

use crate::error::TelemetryResult;
use async_trait::async_trait;

/// 文档成帧方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 整场会话一个文档：打开时写开头，关闭时写结尾
    Session,
    /// 每批一个完整文档：开头与结尾已包含在每次 `flush` 的片段中
    PerBatch,
}

#[async_trait]
pub trait Persistence: Send {
    /// 名称（用于日志与错误）
    fn name(&self) -> &'static str;

    fn framing(&self) -> Framing {
        Framing::Session
    }

    /// 会话开始，写入文档开头
    async fn open(&mut self, header: &str) -> TelemetryResult<()>;

    /// 提交一批非空片段
    async fn flush(&mut self, fragments: &[String]) -> TelemetryResult<()>;

    /// 会话结束，写入文档结尾并释放资源
    async fn end_flush(&mut self, footer: &str) -> TelemetryResult<()>;
}
