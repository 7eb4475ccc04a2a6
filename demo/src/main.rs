use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use telemetry_core::config::SinkKind;
use telemetry_core::event::{LevelEvent, SampledEvent, SceneChange};
use telemetry_core::{Tracker, TrackerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/telemetry.toml");

#[derive(Debug, Clone, Copy, Serialize)]
struct Position {
    x: f32,
    y: f32,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Result<TrackerConfig> {
    let path = std::env::var("TELEMETRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    tracing::info!(path = %path, "loading telemetry config");
    Ok(TrackerConfig::load(&path)?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();

    let config = load_config()?;
    let tracker = Tracker::initialize(&config).await?;
    println!("session: {}", tracker.session_id());

    // 进入关卡
    tracker.submit(&SceneChange::new("MainMenu", "Forest"));
    tracker.submit(&LevelEvent::start("forest-1"));

    // 玩家位置每 200ms 采样一次
    let mut step = 0.0f32;
    tracker.track_persistent(SampledEvent::new(
        "PlayerPosition",
        Duration::from_millis(200),
        move || {
            step += 1.0;
            Position {
                x: step * 0.5,
                y: (step * 0.3).sin(),
            }
        },
    ));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    println!("scheduled: {:?}", tracker.scheduled());

    // 暂停期间停止采样
    tracker.submit(&LevelEvent::pause("forest-1"));
    let stopped = tracker.stop_tracking_persistent("PlayerPosition");
    println!("stopped {stopped} position sampler(s)");
    tokio::time::sleep(Duration::from_millis(500)).await;
    tracker.submit(&LevelEvent::unpause("forest-1"));

    // 已在注册表中关闭，不会落盘
    let accepted = tracker.submit(&LevelEvent::restart("forest-1"));
    println!("restart accepted: {accepted}");

    tracker.submit(&LevelEvent::end("forest-1"));
    let flushed = tracker.flush_now().await?;
    println!("flushed {flushed} events");

    tracker.shutdown().await?;

    match config.sink {
        SinkKind::File => println!("written to {}", config.file_directory()?.display()),
        SinkKind::Network => println!(
            "posted to {}",
            config.destination.as_deref().unwrap_or_default()
        ),
    }
    Ok(())
}
