//! Tracker（编排器）
//!
//! 启动时打开落盘目标、提交 `SessionStart` 并拉起刷新循环；周期事件提交后
//! 按需拉起调度循环。刷新循环独占序列化与落盘管线，停止时将其交还，
//! 由 `shutdown` 完成最后一次同步的 drain → flush → end_flush。
//!
//! 刷新循环中的落盘失败是致命的：记录一次错误日志，关闭队列并停止两个循环，
//! 尽力写入文档结尾；之后的 `shutdown` 返回 `TelemetryError::Halted`。
//!
use super::{EventQueue, FlushPipeline, PersistentEventScheduler};
use crate::clock::Clock;
use crate::config::{MAX_FLUSH_INTERVAL, SinkKind, TrackerConfig};
use crate::error::{TelemetryError, TelemetryResult};
use crate::event::{PersistentEvent, SessionEnd, SessionStart, TrackerEvent};
use crate::filter::{AllowAll, EventFilter};
use crate::persist::{FilePersistence, Persistence};
use crate::serializer::{Serializer, serializer_for};
use bon::Builder;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

type FlushReply = oneshot::Sender<TelemetryResult<usize>>;

fn allow_all() -> Arc<dyn EventFilter> {
    Arc::new(AllowAll)
}

/// 显式装配 Tracker 的各个组件
#[derive(Builder)]
pub struct TrackerSetup {
    serializer: Box<dyn Serializer>,
    persistence: Box<dyn Persistence>,
    #[builder(default = allow_all())]
    filter: Arc<dyn EventFilter>,
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    flush_interval: Duration,
    #[builder(default)]
    clock: Clock,
    /// 未指定时生成 UUID v4
    #[builder(into)]
    session_id: Option<String>,
}

impl TrackerSetup {
    /// 打开落盘目标、提交会话开始标记并启动刷新循环
    pub async fn launch(self) -> TelemetryResult<Tracker> {
        if self.flush_interval.is_zero() || self.flush_interval > MAX_FLUSH_INTERVAL {
            return Err(TelemetryError::config(format!(
                "flush interval must be in (0, {}s], got {:?}",
                MAX_FLUSH_INTERVAL.as_secs(),
                self.flush_interval
            )));
        }

        let session_id = self
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let queue = Arc::new(EventQueue::new(self.filter, self.clock, session_id));

        let mut pipeline = FlushPipeline::new(self.serializer, self.persistence);
        pipeline.open().await?;
        let sink = pipeline.sink_name();

        queue.submit(&SessionStart);

        let runtime = Handle::current();
        let token = CancellationToken::new();
        let halt = Arc::new(OnceLock::new());
        let scheduler =
            PersistentEventScheduler::new(queue.clone(), runtime.clone(), token.child_token());
        let (flush_tx, flush_rx) = mpsc::channel(8);

        let flush_task = runtime.spawn(flush_loop(
            pipeline,
            queue.clone(),
            halt.clone(),
            token.clone(),
            flush_rx,
            self.flush_interval,
        ));

        tracing::info!(
            session_id = queue.session_id(),
            sink,
            flush_interval = ?self.flush_interval,
            "telemetry tracker started"
        );

        Ok(Tracker {
            queue,
            scheduler,
            halt,
            token,
            flush_tx,
            flush_task: Some(flush_task),
        })
    }
}

pub struct Tracker {
    queue: Arc<EventQueue>,
    scheduler: Arc<PersistentEventScheduler>,
    halt: Arc<OnceLock<String>>,
    token: CancellationToken,
    flush_tx: mpsc::Sender<FlushReply>,
    flush_task: Option<JoinHandle<Option<FlushPipeline>>>,
}

impl Tracker {
    pub fn builder() -> TrackerSetupBuilder {
        TrackerSetup::builder()
    }

    /// 按配置装配序列化格式、落盘目标与注册表并启动
    pub async fn initialize(config: &TrackerConfig) -> TelemetryResult<Self> {
        config.validate()?;
        let filter = config.event_filter()?;
        let serializer = serializer_for(config.effective_format());

        let persistence: Box<dyn Persistence> = match config.sink {
            SinkKind::File => {
                let directory = config.file_directory()?;
                Box::new(FilePersistence::create(directory, serializer.file_extension()).await?)
            }
            SinkKind::Network => network_sink(config)?,
        };

        TrackerSetup::builder()
            .serializer(serializer)
            .persistence(persistence)
            .filter(filter)
            .flush_interval(config.flush_interval())
            .build()
            .launch()
            .await
    }

    /// 提交一次性事件；被注册表拒绝或 Tracker 已终止时返回 `false`
    pub fn submit<E>(&self, event: &E) -> bool
    where
        E: TrackerEvent + ?Sized,
    {
        self.queue.submit(event)
    }

    /// 开始跟踪周期事件
    pub fn track_persistent<E>(&self, event: E) -> bool
    where
        E: PersistentEvent + 'static,
    {
        self.scheduler.track(Box::new(event))
    }

    /// 停止跟踪指定类型的周期事件，返回受影响的条目数
    pub fn stop_tracking_persistent(&self, event_type: &str) -> usize {
        self.scheduler.stop_tracking(event_type)
    }

    /// 立即刷新一次，返回写入的事件数
    pub async fn flush_now(&self) -> TelemetryResult<usize> {
        let (reply, done) = oneshot::channel();
        if self.flush_tx.send(reply).await.is_err() {
            return Err(self.halted_error());
        }
        done.await.map_err(|_| self.halted_error())?
    }

    pub fn session_id(&self) -> &str {
        self.queue.session_id()
    }

    /// 队列中尚未刷新的事件数
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// 周期事件排期：`(事件类型, 到期时间)`
    pub fn scheduled(&self) -> Vec<(String, i64)> {
        self.scheduler.schedule()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.get().is_some()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt.get().map(String::as_str)
    }

    /// 停止两个循环，并同步完成最后一次刷新与文档收尾
    pub async fn shutdown(mut self) -> TelemetryResult<()> {
        self.scheduler.shutdown().await;
        self.queue.submit(&SessionEnd);
        self.token.cancel();

        let pipeline = match self.flush_task.take() {
            Some(task) => task.await.map_err(|err| {
                TelemetryError::halted(format!("flush task failed: {err}"))
            })?,
            None => None,
        };
        let Some(mut pipeline) = pipeline else {
            return Err(self.halted_error());
        };

        self.queue.close();
        let batch = self.queue.drain();
        let flushed = pipeline.flush(batch).await;
        let finished = pipeline.finish().await;

        match (flushed, finished) {
            (Ok(count), Ok(())) => {
                tracing::info!(session_id = self.session_id(), count, "telemetry tracker shut down");
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(session_id = self.session_id(), error = %err, "final telemetry flush failed");
                Err(err)
            }
        }
    }

    fn halted_error(&self) -> TelemetryError {
        TelemetryError::halted(self.halt_reason().unwrap_or("tracker stopped"))
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        // 未调用 shutdown：刷新循环随取消退出，缓冲中的事件与文档结尾不会写出
        if self.flush_task.is_some() && !self.is_halted() {
            tracing::warn!(
                session_id = self.session_id(),
                pending = self.pending_events(),
                "tracker dropped without shutdown; document footer not written"
            );
        }
        self.token.cancel();
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("session_id", &self.session_id())
            .field("pending_events", &self.pending_events())
            .field("scheduler", &self.scheduler)
            .field("halted", &self.halt_reason())
            .finish()
    }
}

#[cfg(feature = "network")]
fn network_sink(config: &TrackerConfig) -> TelemetryResult<Box<dyn Persistence>> {
    let url = config
        .destination
        .as_deref()
        .ok_or_else(|| TelemetryError::config("network sink requires a destination URL"))?;
    Ok(Box::new(crate::persist::ServerPersistence::new(url)))
}

#[cfg(not(feature = "network"))]
fn network_sink(_config: &TrackerConfig) -> TelemetryResult<Box<dyn Persistence>> {
    Err(TelemetryError::config(
        "network sink requires the `network` feature",
    ))
}

/// 周期刷新；停止时交还管线，致命失败时返回 `None`
async fn flush_loop(
    mut pipeline: FlushPipeline,
    queue: Arc<EventQueue>,
    halt: Arc<OnceLock<String>>,
    token: CancellationToken,
    mut requests: mpsc::Receiver<FlushReply>,
    interval: Duration,
) -> Option<FlushPipeline> {
    let start = Instant::now().checked_add(interval).unwrap_or_else(Instant::now);
    let mut ticker = time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let reply = tokio::select! {
            biased;
            _ = token.cancelled() => return Some(pipeline),
            _ = ticker.tick() => None,
            Some(reply) = requests.recv() => Some(reply),
        };

        let batch = queue.drain();
        let size = batch.len();
        match pipeline.flush(batch).await {
            Ok(count) => {
                if count > 0 {
                    tracing::debug!(count, skipped = size - count, "telemetry batch flushed");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(count));
                }
            }
            Err(err) => {
                tracing::error!(
                    session_id = queue.session_id(),
                    sink = pipeline.sink_name(),
                    lost = size,
                    error = %err,
                    "telemetry sink failed; tracker halted"
                );
                let _ = halt.set(err.to_string());
                queue.close();
                token.cancel();

                if let Err(err) = pipeline.finish().await {
                    tracing::debug!(error = %err, "could not close telemetry document after failure");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
                return None;
            }
        }
    }
}
