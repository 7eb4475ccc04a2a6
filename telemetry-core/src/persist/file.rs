//! 文件落盘（FilePersistence）
//!
//! 文件名形如 `<n>_Telemetry-<d>-<m>-<yyyy>.<ext>`：`n` 为同日期同扩展名下
//! 已存在的最大会话序号加一（目录中没有时为 0），保证同一天的多次运行不会互相覆盖。
//! 打开时写入文档开头，之后每批以追加方式写入，结束时写入结尾。
//!
use super::{Framing, Persistence};
use crate::error::{TelemetryError, TelemetryResult};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

const SINK: &str = "file";

#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    file: Option<File>,
}

impl FilePersistence {
    pub const BASE_NAME: &'static str = "Telemetry";

    /// 在 `directory` 下为今天的会话分配文件
    pub async fn create(directory: impl AsRef<Path>, extension: &str) -> TelemetryResult<Self> {
        Self::create_on(directory, extension, Local::now().date_naive()).await
    }

    /// 在 `directory` 下为指定日期的会话分配文件
    pub async fn create_on(
        directory: impl AsRef<Path>,
        extension: &str,
        date: NaiveDate,
    ) -> TelemetryResult<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)
            .await
            .map_err(|err| TelemetryError::sink_write(SINK, err))?;

        let file_name = format!(
            "{}-{}.{}",
            Self::BASE_NAME,
            date.format("%-d-%-m-%Y"),
            extension
        );
        let session = next_session_number(directory, &file_name).await?;
        let path = directory.join(format!("{session}_{file_name}"));

        Ok(Self { path, file: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&mut self, content: &str) -> TelemetryResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(TelemetryError::sink_write(
                SINK,
                format!("{} is not open", self.path.display()),
            ));
        };

        file.write_all(content.as_bytes())
            .await
            .map_err(|err| TelemetryError::sink_write(SINK, err))?;
        file.flush()
            .await
            .map_err(|err| TelemetryError::sink_write(SINK, err))
    }
}

async fn next_session_number(directory: &Path, file_name: &str) -> TelemetryResult<u32> {
    let mut entries = fs::read_dir(directory)
        .await
        .map_err(|err| TelemetryError::sink_write(SINK, err))?;

    let mut next = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| TelemetryError::sink_write(SINK, err))?
    {
        let name = entry.file_name();
        let Some((counter, rest)) = name.to_str().and_then(|n| n.split_once('_')) else {
            continue;
        };
        if rest != file_name {
            continue;
        }
        if let Ok(n) = counter.parse::<u32>() {
            next = next.max(n.saturating_add(1));
        }
    }

    Ok(next)
}

#[async_trait]
impl Persistence for FilePersistence {
    fn name(&self) -> &'static str {
        SINK
    }

    fn framing(&self) -> Framing {
        Framing::Session
    }

    async fn open(&mut self, header: &str) -> TelemetryResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| TelemetryError::sink_write(SINK, err))?;
        self.file = Some(file);

        tracing::debug!(path = %self.path.display(), "telemetry file opened");
        self.append(header).await
    }

    async fn flush(&mut self, fragments: &[String]) -> TelemetryResult<()> {
        self.append(&fragments.concat()).await
    }

    async fn end_flush(&mut self, footer: &str) -> TelemetryResult<()> {
        self.append(footer).await?;
        if let Some(file) = self.file.take() {
            file.sync_all()
                .await
                .map_err(|err| TelemetryError::sink_write(SINK, err))?;
        }
        Ok(())
    }
}
