#![cfg(feature = "network")]

use anyhow::Result as AnyResult;
use serde_json::Value;
use telemetry_core::event::LevelEvent;
use telemetry_core::persist::{Persistence, ServerPersistence};
use telemetry_core::serializer::JsonSerializer;
use telemetry_core::{TelemetryError, Tracker};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// 收到的一次 POST：请求头（小写）与请求体
struct Captured {
    headers: String,
    body: String,
}

/// 只应答一次的本地 HTTP 端点
async fn one_shot_endpoint(status: &'static str) -> AnyResult<(String, JoinHandle<AnyResult<Captured>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/telemetry", listener.local_addr()?);
    Ok((url, tokio::spawn(serve_once(listener, status))))
}

async fn serve_once(listener: TcpListener, status: &'static str) -> AnyResult<Captured> {
    let (mut stream, _) = listener.accept().await?;
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let read = stream.read(&mut chunk).await?;
        anyhow::ensure!(read > 0, "connection closed before headers");
        raw.extend_from_slice(&chunk[..read]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
    let length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|value| value.trim().parse::<usize>())
        .transpose()?
        .unwrap_or(0);
    while raw.len() < header_end + length {
        let read = stream.read(&mut chunk).await?;
        anyhow::ensure!(read > 0, "connection closed before body");
        raw.extend_from_slice(&chunk[..read]);
    }

    let response = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(Captured {
        headers,
        body: String::from_utf8(raw[header_end..header_end + length].to_vec())?,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_is_posted_as_a_standalone_json_document() -> AnyResult<()> {
    let (url, server) = one_shot_endpoint("200 OK").await?;
    let tracker = Tracker::builder()
        .serializer(Box::new(JsonSerializer::new()))
        .persistence(Box::new(ServerPersistence::new(url)))
        .session_id("net-session")
        .build()
        .launch()
        .await?;

    tracker.submit(&LevelEvent::start("1-1"));
    assert_eq!(tracker.flush_now().await?, 2);

    let captured = server.await??;
    assert!(captured.headers.starts_with("post /telemetry "), "{}", captured.headers);
    assert!(captured.headers.contains("content-type: application/json"));

    let document: Value = serde_json::from_str(&captured.body)?;
    let events = document["events"].as_array().unwrap();
    let types: Vec<_> = events
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["SessionStart", "LevelStart"]);
    assert!(events.iter().all(|e| e["session_id"] == "net-session"));

    // 端点已关闭，结束时的 SessionEnd 无法送达
    drop(tracker);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_status_is_a_sink_write_failure() -> AnyResult<()> {
    let (url, server) = one_shot_endpoint("500 Internal Server Error").await?;
    let mut sink = ServerPersistence::new(url);

    let err = sink
        .flush(&[r#"{"events":[]}"#.to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, TelemetryError::SinkWrite { sink: "network", .. }), "{err}");

    let captured = server.await??;
    assert_eq!(captured.body, r#"{"events":[]}"#);
    Ok(())
}
