use anyhow::Result as AnyResult;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telemetry_core::event::{LevelEvent, SceneChange};
use telemetry_core::{TelemetryError, Tracker, TrackerConfig};

fn telemetry_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn config(dir: &Path, format: &str, extra: &str) -> AnyResult<TrackerConfig> {
    let toml = format!(
        "flush_interval_secs = 0.05\noutput_format = \"{format}\"\nsink = \"file\"\ndestination = {:?}\n{extra}",
        dir.display().to_string()
    );
    Ok(TrackerConfig::from_toml_str(&toml)?)
}

#[tokio::test(flavor = "multi_thread")]
async fn json_file_session_is_one_readable_document() -> AnyResult<()> {
    let dir = tempfile::tempdir()?;
    let tracker = Tracker::initialize(&config(dir.path(), "json", "")?).await?;

    tracker.submit(&SceneChange::new("Menu", "Level1"));
    tracker.submit(&LevelEvent::start("1-1"));
    tokio::time::sleep(Duration::from_millis(150)).await;
    tracker.submit(&LevelEvent::end("1-1"));
    tracker.shutdown().await?;

    let files = telemetry_files(dir.path());
    assert_eq!(files.len(), 1);
    let name = file_name(&files[0]);
    assert!(name.starts_with("0_Telemetry-"), "{name}");
    assert!(name.ends_with(".json"), "{name}");

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&files[0])?)?;
    let events = document["events"].as_array().unwrap();
    let types: Vec<_> = events
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["SessionStart", "SceneChange", "LevelStart", "LevelEnd", "SessionEnd"]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn consecutive_runs_get_increasing_session_counters() -> AnyResult<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), "xml", "")?;

    for _ in 0..2 {
        let tracker = Tracker::initialize(&config).await?;
        tracker.submit(&LevelEvent::restart("boss"));
        tracker.shutdown().await?;
    }

    let files = telemetry_files(dir.path());
    let names: Vec<_> = files.iter().map(|p| file_name(p)).collect();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("0_Telemetry-") && names[0].ends_with(".xml"));
    assert!(names[1].starts_with("1_Telemetry-") && names[1].ends_with(".xml"));

    let xml = std::fs::read_to_string(&files[1])?;
    assert!(xml.starts_with("<events>\n<SessionStart "));
    assert!(xml.contains("<LevelRestart "));
    assert!(xml.contains("level_name=\"boss\""));
    assert!(xml.ends_with("</events>"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn registry_from_config_filters_events() -> AnyResult<()> {
    let dir = tempfile::tempdir()?;
    let registry = r#"
[[registry]]
name = "SessionStart"

[[registry]]
name = "SessionEnd"

[[registry]]
name = "LevelStart"
active = false
"#;
    let tracker = Tracker::initialize(&config(dir.path(), "json", registry)?).await?;

    assert!(!tracker.submit(&LevelEvent::start("1-1")));
    assert!(!tracker.submit(&SceneChange::new("A", "B")));
    tracker.shutdown().await?;

    let files = telemetry_files(dir.path());
    let document: Value = serde_json::from_str(&std::fs::read_to_string(&files[0])?)?;
    assert_eq!(document["events"].as_array().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn reject_policy_without_registry_fails_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackerConfig::builder()
        .destination(dir.path().display().to_string())
        .missing_registry(telemetry_core::config::MissingRegistryPolicy::Reject)
        .build();

    let err = Tracker::initialize(&config).await.unwrap_err();
    assert!(matches!(err, TelemetryError::Config { .. }));
    assert!(telemetry_files(dir.path()).is_empty());
}
