//! 刷新管线：序列化 + 落盘
//!
//! 由刷新循环独占（单写者）。按落盘目标的成帧方式组织文档：
//! - `Session`：打开时写开头，每批只写事件片段，结束时写结尾；
//! - `PerBatch`：每批重置序列化状态，并在片段前后补齐开头与结尾。
//!
//! 单个事件序列化失败时跳过该事件，文档仍保持平衡。
//!
use crate::error::TelemetryResult;
use crate::event::EventRecord;
use crate::persist::{Framing, Persistence};
use crate::serializer::Serializer;

pub struct FlushPipeline {
    serializer: Box<dyn Serializer>,
    persistence: Box<dyn Persistence>,
    finished: bool,
}

impl FlushPipeline {
    pub fn new(serializer: Box<dyn Serializer>, persistence: Box<dyn Persistence>) -> Self {
        Self {
            serializer,
            persistence,
            finished: false,
        }
    }

    fn framing(&self) -> Framing {
        self.persistence.framing()
    }

    pub fn sink_name(&self) -> &'static str {
        self.persistence.name()
    }

    pub async fn open(&mut self) -> TelemetryResult<()> {
        let header = match self.framing() {
            Framing::Session => self.serializer.starting_fragment(),
            Framing::PerBatch => "",
        };
        self.persistence.open(header).await
    }

    /// 序列化并提交一批事件，返回实际写入的事件数；空批次不触达落盘目标
    pub async fn flush(&mut self, records: Vec<EventRecord>) -> TelemetryResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let per_batch = self.framing() == Framing::PerBatch;
        let mut fragments = Vec::with_capacity(records.len() + 2);
        if per_batch {
            self.serializer.reset();
            fragments.push(self.serializer.starting_fragment().to_string());
        }

        let mut written = 0;
        for record in &records {
            match self.serializer.serialize(record) {
                Ok(fragment) => {
                    fragments.push(fragment);
                    written += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        event_type = record.event_type(),
                        error = %err,
                        "event skipped: serialization failed"
                    );
                }
            }
        }

        if written == 0 {
            return Ok(0);
        }
        if per_batch {
            fragments.push(self.serializer.final_fragment().to_string());
        }

        self.persistence.flush(&fragments).await?;
        Ok(written)
    }

    /// 写入文档结尾；重复调用无效果
    pub async fn finish(&mut self) -> TelemetryResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let footer = match self.framing() {
            Framing::Session => self.serializer.final_fragment(),
            Framing::PerBatch => "",
        };
        self.persistence.end_flush(footer).await
    }
}
