//! Tracker 配置
//!
//! 可直接构建（`TrackerConfig::builder()`），也可从 TOML 加载：
//!
//! ```toml
//! flush_interval_secs = 2.5
//! output_format = "xml"
//! sink = "file"
//! destination = "./telemetry"
//! missing_registry = "allow_all"
//!
//! [[registry]]
//! name = "LevelStart"
//!
//! [[registry]]
//! name = "PlayerPosition"
//! active = false
//! ```
//!
use crate::error::{TelemetryError, TelemetryResult};
use crate::filter::{AllowAll, EventFilter, EventRegistry};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use crate::filter::EventActivation;

const DEFAULT_FLUSH_INTERVAL_SECS: f64 = 5.0;
/// 刷新间隔上限（一天）
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_DIRECTORY: &str = "telemetry";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    File,
    Network,
}

/// 未提供注册表时的准入策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRegistryPolicy {
    /// 放行全部事件
    #[default]
    AllowAll,
    /// 视为配置错误，初始化失败
    Reject,
}

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 刷新间隔（秒）
    #[builder(default = DEFAULT_FLUSH_INTERVAL_SECS)]
    pub flush_interval_secs: f64,
    #[builder(default)]
    pub output_format: OutputFormat,
    #[builder(default)]
    pub sink: SinkKind,
    /// 文件落盘为目录，网络落盘为 URL
    #[builder(into)]
    pub destination: Option<String>,
    pub registry: Option<Vec<EventActivation>>,
    #[builder(default)]
    pub missing_registry: MissingRegistryPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            output_format: OutputFormat::default(),
            sink: SinkKind::default(),
            destination: None,
            registry: None,
            missing_registry: MissingRegistryPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(content: &str) -> TelemetryResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> TelemetryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            TelemetryError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        let interval = Duration::try_from_secs_f64(self.flush_interval_secs)
            .ok()
            .filter(|interval| !interval.is_zero() && *interval <= MAX_FLUSH_INTERVAL);
        if interval.is_none() {
            return Err(TelemetryError::config(format!(
                "flush_interval_secs must be in (0, {}], got {}",
                MAX_FLUSH_INTERVAL.as_secs(),
                self.flush_interval_secs
            )));
        }

        if self.sink == SinkKind::Network
            && self.destination.as_deref().is_none_or(|url| url.trim().is_empty())
        {
            return Err(TelemetryError::config(
                "network sink requires a destination URL",
            ));
        }

        if self.registry.is_none() && self.missing_registry == MissingRegistryPolicy::Reject {
            return Err(TelemetryError::config(
                "no event registry supplied and missing_registry = \"reject\"",
            ));
        }

        Ok(())
    }

    /// 刷新间隔；超出范围的值按上限折算，非法值回退为默认值
    pub fn flush_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.flush_interval_secs)
            .map(|interval| interval.min(MAX_FLUSH_INTERVAL))
            .unwrap_or(Duration::from_secs_f64(DEFAULT_FLUSH_INTERVAL_SECS))
    }

    /// 实际使用的输出格式：网络落盘只接受 JSON
    pub fn effective_format(&self) -> OutputFormat {
        if self.sink == SinkKind::Network && self.output_format != OutputFormat::Json {
            tracing::warn!(
                requested = ?self.output_format,
                "network sink only accepts JSON; falling back to JSON"
            );
            return OutputFormat::Json;
        }
        self.output_format
    }

    /// 按注册表与缺省策略构建准入过滤器
    pub fn event_filter(&self) -> TelemetryResult<Arc<dyn EventFilter>> {
        match (&self.registry, self.missing_registry) {
            (Some(entries), _) => Ok(Arc::new(EventRegistry::new(entries.iter().cloned()))),
            (None, MissingRegistryPolicy::AllowAll) => Ok(Arc::new(AllowAll)),
            (None, MissingRegistryPolicy::Reject) => Err(TelemetryError::config(
                "no event registry supplied and missing_registry = \"reject\"",
            )),
        }
    }

    /// 文件落盘目录；未配置时使用平台数据目录下的 `telemetry/`
    pub fn file_directory(&self) -> TelemetryResult<PathBuf> {
        if let Some(dir) = self.destination.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        dirs::data_dir()
            .map(|dir| dir.join(DEFAULT_DIRECTORY))
            .ok_or_else(|| TelemetryError::config("no destination and no platform data directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.sink, SinkKind::File);
    }

    #[test]
    fn parses_full_document() {
        let config = TrackerConfig::from_toml_str(
            r#"
            flush_interval_secs = 0.5
            output_format = "xml"
            sink = "file"
            destination = "/tmp/out"
            missing_registry = "reject"

            [[registry]]
            name = "LevelStart"

            [[registry]]
            name = "PlayerPosition"
            active = false
            "#,
        )
        .unwrap();

        assert_eq!(config.flush_interval(), Duration::from_millis(500));
        assert_eq!(config.output_format, OutputFormat::Xml);
        assert_eq!(config.missing_registry, MissingRegistryPolicy::Reject);
        assert_eq!(
            config.registry.as_deref().unwrap(),
            [
                EventActivation::new("LevelStart", true),
                EventActivation::new("PlayerPosition", false),
            ]
        );

        let filter = config.event_filter().unwrap();
        assert!(filter.is_active("LevelStart"));
        assert!(!filter.is_active("PlayerPosition"));
        assert_eq!(config.file_directory().unwrap(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn rejects_non_positive_interval() {
        for bad in ["flush_interval_secs = 0.0", "flush_interval_secs = -1.0", "flush_interval_secs = nan"] {
            let err = TrackerConfig::from_toml_str(bad).unwrap_err();
            assert!(matches!(err, TelemetryError::Config { .. }), "{bad}");
        }
    }

    #[test]
    fn rejects_interval_beyond_a_day() {
        for bad in ["flush_interval_secs = 1e30", "flush_interval_secs = inf", "flush_interval_secs = 86401.0"] {
            let err = TrackerConfig::from_toml_str(bad).unwrap_err();
            assert!(matches!(err, TelemetryError::Config { .. }), "{bad}");
        }

        // 未经校验的配置也不会在换算时 panic
        let unchecked = TrackerConfig::builder().flush_interval_secs(1e30).build();
        assert_eq!(unchecked.flush_interval(), MAX_FLUSH_INTERVAL);
        let nan = TrackerConfig::builder().flush_interval_secs(f64::NAN).build();
        assert_eq!(nan.flush_interval(), Duration::from_secs(5));

        let day = TrackerConfig::from_toml_str("flush_interval_secs = 86400.0").unwrap();
        assert_eq!(day.flush_interval(), MAX_FLUSH_INTERVAL);
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let err = TrackerConfig::from_toml_str(r#"output_format = "yaml""#).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[test]
    fn network_sink_requires_url_and_forces_json() {
        let missing = TrackerConfig::builder().sink(SinkKind::Network).build();
        assert!(missing.validate().is_err());

        let config = TrackerConfig::builder()
            .sink(SinkKind::Network)
            .output_format(OutputFormat::Xml)
            .destination("http://localhost:8080/telemetry")
            .build();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_format(), OutputFormat::Json);
    }

    #[test]
    fn missing_registry_policy_selects_filter() {
        let permissive = TrackerConfig::default();
        assert!(permissive.event_filter().unwrap().is_active("Anything"));

        let strict = TrackerConfig::builder()
            .missing_registry(MissingRegistryPolicy::Reject)
            .build();
        assert!(strict.validate().is_err());
        assert!(strict.event_filter().is_err());
    }
}
