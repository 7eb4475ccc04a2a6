//! 内存落盘（MemoryPersistence）
//!
//! 将写入内容保存在共享内存中，克隆出的句柄与装入 Tracker 的实例共享同一份转录，
//! 典型用途：测试环境、示例与需要自行转发数据的宿主。
//!
use super::{Framing, Persistence};
use crate::error::TelemetryResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Transcript {
    text: String,
    batches: Vec<String>,
    opened: bool,
    closed: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    transcript: Arc<Mutex<Transcript>>,
    framing: Framing,
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPersistence {
    /// 整场会话一个文档
    pub fn new() -> Self {
        Self::with_framing(Framing::Session)
    }

    /// 每批一个完整文档
    pub fn per_batch() -> Self {
        Self::with_framing(Framing::PerBatch)
    }

    fn with_framing(framing: Framing) -> Self {
        Self {
            transcript: Arc::new(Mutex::new(Transcript::default())),
            framing,
        }
    }

    /// 迄今写入的全部内容
    pub fn contents(&self) -> String {
        self.transcript.lock().text.clone()
    }

    /// 每次 `flush` 写入的内容
    pub fn batches(&self) -> Vec<String> {
        self.transcript.lock().batches.clone()
    }

    pub fn is_open(&self) -> bool {
        let transcript = self.transcript.lock();
        transcript.opened && !transcript.closed
    }

    pub fn is_closed(&self) -> bool {
        self.transcript.lock().closed
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn framing(&self) -> Framing {
        self.framing
    }

    async fn open(&mut self, header: &str) -> TelemetryResult<()> {
        let mut transcript = self.transcript.lock();
        transcript.opened = true;
        transcript.text.push_str(header);
        Ok(())
    }

    async fn flush(&mut self, fragments: &[String]) -> TelemetryResult<()> {
        let batch = fragments.concat();
        let mut transcript = self.transcript.lock();
        transcript.text.push_str(&batch);
        transcript.batches.push(batch);
        Ok(())
    }

    async fn end_flush(&mut self, footer: &str) -> TelemetryResult<()> {
        let mut transcript = self.transcript.lock();
        transcript.text.push_str(footer);
        transcript.closed = true;
        Ok(())
    }
}
