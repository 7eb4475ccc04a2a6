//! 服务端落盘（ServerPersistence）
//!
//! 每批作为一个完整的 JSON 文档 POST 至配置的 URL，非 2xx 响应视为写入失败。
//! 服务端没有需要收尾的文档，`open` / `end_flush` 不产生请求。
//!
use super::{Framing, Persistence};
use crate::error::TelemetryResult;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

#[derive(Debug, Clone)]
pub struct ServerPersistence {
    client: reqwest::Client,
    endpoint: String,
}

impl ServerPersistence {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Persistence for ServerPersistence {
    fn name(&self) -> &'static str {
        "network"
    }

    fn framing(&self) -> Framing {
        Framing::PerBatch
    }

    async fn open(&mut self, _header: &str) -> TelemetryResult<()> {
        Ok(())
    }

    async fn flush(&mut self, fragments: &[String]) -> TelemetryResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(fragments.concat())
            .send()
            .await?;

        let status = response.status();
        response.error_for_status()?;
        tracing::debug!(endpoint = %self.endpoint, %status, "telemetry batch uploaded");
        Ok(())
    }

    async fn end_flush(&mut self, _footer: &str) -> TelemetryResult<()> {
        Ok(())
    }
}
