//! 周期事件调度器（PersistentEventScheduler）
//!
//! 周期事件在任意时刻只处于两个位置之一：
//! - 静置于按 `(due_at, seq)` 排序的最小堆中；
//! - 位于唯一的在途槽（in-flight slot）中，等待到期或正在触发。
//!
//! 调度循环取出最近到期的条目放入在途槽，在不持有任何锁的情况下休眠至到期时刻，
//! 醒来后再检查在途槽决定是否仍然触发。`stop_tracking` 对静置条目立即生效；
//! 对等待中的条目清空在途槽（不再触发）；对正在触发的条目仅标记取消，
//! 本次触发照常完成但不会重新入堆。
//!
//! 到期时间相同的条目按入堆顺序触发（`seq` 单调递增，重新入堆时重新分配）。
//! 调度器与事件队列各自持有一把锁，二者从不同时持有。
//!
use super::EventQueue;
use crate::event::PersistentEvent;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

struct ScheduledEntry {
    due_at: i64,
    seq: u64,
    period_ms: i64,
    event: Box<dyn PersistentEvent>,
}

impl ScheduledEntry {
    fn event_type(&self) -> &str {
        self.event.event_type()
    }
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    // BinaryHeap 为最大堆，反转比较使最早到期（其次最早入堆）的条目位于堆顶
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_at, other.seq).cmp(&(self.due_at, self.seq))
    }
}

enum InFlight {
    Idle,
    Waiting(ScheduledEntry),
    Firing { event_type: String, cancelled: bool },
}

struct SchedulerState {
    resting: BinaryHeap<ScheduledEntry>,
    in_flight: InFlight,
    running: bool,
    next_seq: u64,
}

impl SchedulerState {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

enum Wake {
    Due,
    Rearm,
    Shutdown,
}

pub struct PersistentEventScheduler {
    state: Mutex<SchedulerState>,
    queue: Arc<EventQueue>,
    runtime: Handle,
    token: CancellationToken,
    rearm: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistentEventScheduler {
    pub fn new(queue: Arc<EventQueue>, runtime: Handle, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                resting: BinaryHeap::new(),
                in_flight: InFlight::Idle,
                running: false,
                next_seq: 0,
            }),
            queue,
            runtime,
            token,
            rearm: Notify::new(),
            worker: Mutex::new(None),
        })
    }

    /// 开始跟踪周期事件，首次触发在一个周期之后
    ///
    /// 被注册表拒绝、周期不足 1ms 或调度器已关闭时返回 `false`。
    pub fn track(self: &Arc<Self>, event: Box<dyn PersistentEvent>) -> bool {
        let event_type = event.event_type().to_string();
        if !self.queue.is_active(&event_type) {
            tracing::trace!(event_type = %event_type, "persistent event not enabled; ignored");
            return false;
        }

        let period_ms = period_millis(event.period());
        if period_ms < 1 {
            tracing::warn!(event_type = %event_type, period = ?event.period(), "persistent event period must be at least 1ms");
            return false;
        }

        let due_at = self.queue.clock().now_millis().saturating_add(period_ms);
        let spawn = {
            let mut state = self.state.lock();
            if self.token.is_cancelled() {
                return false;
            }

            let seq = state.next_seq();
            state.resting.push(ScheduledEntry {
                due_at,
                seq,
                period_ms,
                event,
            });

            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };

        tracing::debug!(event_type = %event_type, due_at, period_ms, "persistent event tracked");
        if spawn {
            let handle = self.runtime.spawn(Arc::clone(self).run());
            *self.worker.lock() = Some(handle);
        } else {
            // 唤醒等待中的循环重新比较堆顶
            self.rearm.notify_one();
        }
        true
    }

    /// 停止跟踪指定类型的全部周期事件，返回受影响的条目数
    pub fn stop_tracking(&self, event_type: &str) -> usize {
        let mut state = self.state.lock();

        let before = state.resting.len();
        state.resting.retain(|entry| entry.event_type() != event_type);
        let mut stopped = before - state.resting.len();

        let clear_waiting = match &mut state.in_flight {
            InFlight::Waiting(entry) => entry.event_type() == event_type,
            InFlight::Firing {
                event_type: firing,
                cancelled,
            } => {
                if firing.as_str() == event_type && !*cancelled {
                    *cancelled = true;
                    stopped += 1;
                    tracing::debug!(event_type, "persistent event stopped while firing");
                }
                false
            }
            InFlight::Idle => false,
        };
        if clear_waiting {
            state.in_flight = InFlight::Idle;
            stopped += 1;
        }

        if stopped > 0 {
            tracing::debug!(event_type, stopped, "persistent event stopped");
        }
        stopped
    }

    /// 当前排期：`(事件类型, 到期时间)`，按触发顺序排列（不含正在触发的条目）
    pub fn schedule(&self) -> Vec<(String, i64)> {
        let state = self.state.lock();
        let mut entries: Vec<&ScheduledEntry> = state.resting.iter().collect();
        if let InFlight::Waiting(entry) = &state.in_flight {
            entries.push(entry);
        }
        entries.sort_by_key(|entry| (entry.due_at, entry.seq));

        entries
            .into_iter()
            .map(|entry| (entry.event_type().to_string(), entry.due_at))
            .collect()
    }

    /// 在途槽中的事件类型
    pub fn in_flight(&self) -> Option<String> {
        match &self.state.lock().in_flight {
            InFlight::Idle => None,
            InFlight::Waiting(entry) => Some(entry.event_type().to_string()),
            InFlight::Firing {
                event_type,
                cancelled: false,
            } => Some(event_type.clone()),
            InFlight::Firing { .. } => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// 停止调度循环并等待其退出；之后的 `track` 一律拒绝
    pub async fn shutdown(&self) {
        self.token.cancel();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "persistent scheduler task failed");
            }
        }

        let mut state = self.state.lock();
        let dropped = state.resting.len() + usize::from(matches!(state.in_flight, InFlight::Waiting(_)));
        state.resting.clear();
        state.in_flight = InFlight::Idle;
        tracing::debug!(dropped, "persistent scheduler stopped");
    }

    async fn run(self: Arc<Self>) {
        let clock = self.queue.clock();

        loop {
            let Some(due_at) = self.take_next() else {
                return;
            };

            let deadline = clock.instant_at(due_at);
            let due = loop {
                let wake = tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Wake::Shutdown,
                    _ = time::sleep_until(deadline) => Wake::Due,
                    _ = self.rearm.notified() => Wake::Rearm,
                };

                match wake {
                    Wake::Due => break true,
                    Wake::Rearm if self.yield_slot(due_at) => break false,
                    Wake::Rearm => continue,
                    Wake::Shutdown => {
                        self.park();
                        return;
                    }
                }
            };
            if !due {
                continue;
            }

            let Some(mut entry) = self.begin_firing() else {
                tracing::debug!(due_at, "persistent event stopped before firing");
                continue;
            };

            entry.event.collect_data();
            self.queue.submit(entry.event.as_ref());
            self.rearm_entry(entry);
        }
    }

    /// 取出堆顶放入在途槽；堆为空时退出循环
    fn take_next(&self) -> Option<i64> {
        let mut state = self.state.lock();
        if self.token.is_cancelled() {
            state.running = false;
            return None;
        }

        match state.resting.pop() {
            Some(entry) => {
                let due_at = entry.due_at;
                state.in_flight = InFlight::Waiting(entry);
                Some(due_at)
            }
            None => {
                state.running = false;
                None
            }
        }
    }

    /// 等待期间被唤醒：在途槽已被清空，或堆中出现更早到期的条目时放弃本轮等待
    fn yield_slot(&self, due_at: i64) -> bool {
        let mut state = self.state.lock();
        if !matches!(state.in_flight, InFlight::Waiting(_)) {
            return true;
        }

        let earlier = state
            .resting
            .peek()
            .is_some_and(|next| next.due_at < due_at);
        if earlier {
            if let InFlight::Waiting(entry) = std::mem::replace(&mut state.in_flight, InFlight::Idle) {
                state.resting.push(entry);
            }
        }
        earlier
    }

    fn begin_firing(&self) -> Option<ScheduledEntry> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.in_flight, InFlight::Idle) {
            InFlight::Waiting(entry) => {
                state.in_flight = InFlight::Firing {
                    event_type: entry.event_type().to_string(),
                    cancelled: false,
                };
                Some(entry)
            }
            _ => None,
        }
    }

    fn rearm_entry(&self, mut entry: ScheduledEntry) {
        let mut state = self.state.lock();
        let cancelled = matches!(state.in_flight, InFlight::Firing { cancelled: true, .. });
        state.in_flight = InFlight::Idle;
        if cancelled {
            return;
        }

        entry.due_at = entry.due_at.saturating_add(entry.period_ms);
        entry.seq = state.next_seq();
        state.resting.push(entry);
    }

    fn park(&self) {
        let mut state = self.state.lock();
        if let InFlight::Waiting(entry) = std::mem::replace(&mut state.in_flight, InFlight::Idle) {
            state.resting.push(entry);
        }
        state.running = false;
    }
}

impl std::fmt::Debug for PersistentEventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentEventScheduler")
            .field("schedule", &self.schedule())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// 周期换算为整毫秒
fn period_millis(period: Duration) -> i64 {
    i64::try_from(period.as_millis()).unwrap_or(i64::MAX)
}
