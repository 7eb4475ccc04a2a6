//! 遥测管线统一错误定义
//!
//! 覆盖落盘、序列化、配置与终止状态四类失败，便于各实现层统一转换为
//! `TelemetryError`。注册表拒绝与调度竞争都不是错误，不在此列。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TelemetryError {
    // --- 落盘 ---
    #[error("sink write failed: sink={sink}, reason={reason}")]
    SinkWrite { sink: &'static str, reason: String },

    // --- 序列化 ---
    #[error("serialization failed: event_type={event_type}, reason={reason}")]
    Serialization { event_type: String, reason: String },

    // --- 配置 ---
    #[error("invalid config: {reason}")]
    Config { reason: String },

    // --- 运行状态 ---
    #[error("tracker halted: {reason}")]
    Halted { reason: String },
}

impl TelemetryError {
    pub fn sink_write(sink: &'static str, reason: impl ToString) -> Self {
        Self::SinkWrite {
            sink,
            reason: reason.to_string(),
        }
    }

    pub fn serialization(event_type: impl Into<String>, reason: impl ToString) -> Self {
        Self::Serialization {
            event_type: event_type.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(reason: impl ToString) -> Self {
        Self::Config {
            reason: reason.to_string(),
        }
    }

    pub fn halted(reason: impl ToString) -> Self {
        Self::Halted {
            reason: reason.to_string(),
        }
    }
}

/// 统一 Result 类型别名
pub type TelemetryResult<T> = Result<T, TelemetryError>;

impl From<toml::de::Error> for TelemetryError {
    fn from(err: toml::de::Error) -> Self {
        TelemetryError::Config {
            reason: err.to_string(),
        }
    }
}

#[cfg(feature = "network")]
impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        TelemetryError::SinkWrite {
            sink: "network",
            reason: err.to_string(),
        }
    }
}
