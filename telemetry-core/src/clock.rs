//! 时钟（Clock）
//!
//! 将墙钟毫秒（Unix epoch）映射到 tokio 的单调时钟上：
//! 创建时记录一对 (`origin` 瞬时, `origin_ms` 墙钟)，之后的“当前时间”
//! 均由单调时钟的流逝推导。事件时间戳与周期事件的到期时间共用同一时钟，
//! 因此在 `tokio::time::pause` 下可以确定性地推进调度。
//!
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct Clock {
    origin: Instant,
    origin_ms: i64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    /// 以给定的墙钟毫秒作为起点，便于测试中使用固定的时间戳
    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    /// 当前墙钟毫秒
    pub fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }

    /// 墙钟毫秒对应的单调时钟瞬时；早于起点的时间折算为起点
    pub fn instant_at(&self, at_ms: i64) -> Instant {
        let offset = u64::try_from(at_ms.saturating_sub(self.origin_ms)).unwrap_or(0);
        self.origin + Duration::from_millis(offset)
    }
}
