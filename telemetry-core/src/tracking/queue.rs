//! 事件队列（EventQueue）
//!
//! 生产者与刷新循环之间的共享信箱：
//! - `submit`：先查询注册表，再在锁外捕获快照，最后持锁追加至队尾；
//! - `drain`：持锁整体取走当前内容，序列化与 I/O 均在锁外进行；
//! - `close`：Tracker 因致命错误终止后，后续提交一律丢弃。
//!
use crate::clock::Clock;
use crate::event::{EventRecord, TrackerEvent};
use crate::filter::EventFilter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct EventQueue {
    events: Mutex<VecDeque<EventRecord>>,
    filter: Arc<dyn EventFilter>,
    clock: Clock,
    session_id: String,
    closed: AtomicBool,
}

impl EventQueue {
    pub fn new(filter: Arc<dyn EventFilter>, clock: Clock, session_id: impl Into<String>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            filter,
            clock,
            session_id: session_id.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// 提交事件；被注册表拒绝或队列已关闭时返回 `false`
    pub fn submit<E>(&self, event: &E) -> bool
    where
        E: TrackerEvent + ?Sized,
    {
        let event_type = event.event_type();
        if !self.is_active(event_type) {
            tracing::trace!(event_type, "event not enabled; dropped");
            return false;
        }
        if self.is_closed() {
            tracing::debug!(event_type, "tracker halted; event dropped");
            return false;
        }

        let record = EventRecord::capture(event, self.clock.now_millis(), &self.session_id);
        self.events.lock().push_back(record);
        true
    }

    /// 取走当前全部事件（按提交顺序）
    pub fn drain(&self) -> Vec<EventRecord> {
        let mut events = self.events.lock();
        std::mem::take(&mut *events).into()
    }

    pub fn is_active(&self, event_type: &str) -> bool {
        self.filter.is_active(event_type)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LevelEvent, SessionStart};
    use crate::filter::{AllowAll, EventRegistry};

    fn queue(filter: Arc<dyn EventFilter>) -> EventQueue {
        EventQueue::new(filter, Clock::starting_at(1_000), "s-1")
    }

    #[tokio::test]
    async fn drain_returns_submission_order_then_empties() {
        let queue = queue(Arc::new(AllowAll));
        for level in ["a", "b", "c", "d", "e"] {
            assert!(queue.submit(&LevelEvent::start(level)));
        }
        assert_eq!(queue.len(), 5);

        let drained = queue.drain();
        let names: Vec<_> = drained
            .iter()
            .map(|r| r.fields()["level_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
        assert!(drained.iter().all(|r| r.session_id() == "s-1"));

        assert!(queue.drain().is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn inactive_events_never_enter_the_queue() {
        let queue = queue(Arc::new(EventRegistry::enabling(["SessionStart"])));

        assert!(!queue.submit(&LevelEvent::start("intro")));
        assert!(queue.submit(&SessionStart));

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].event_type(), "SessionStart");
    }

    #[tokio::test]
    async fn closed_queue_drops_submissions() {
        let queue = queue(Arc::new(AllowAll));
        queue.close();

        assert!(!queue.submit(&SessionStart));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_stamped_with_the_clock() {
        let queue = queue(Arc::new(AllowAll));
        tokio::time::advance(std::time::Duration::from_millis(40)).await;
        queue.submit(&SessionStart);

        assert_eq!(queue.drain()[0].timestamp(), 1_040);
    }
}
