//! 毫秒时钟
//!
//! 应答层的超时和定时器的调度都以毫秒为单位，时钟通过 trait 注入，
//! 测试中可以用 [`ManualClock`] 精确推进时间。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 单调时钟锚点（首次访问时设置）
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 自进程启动以来的毫秒数（单调）
pub fn monotonic_millis() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// 毫秒时间源
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// 基于 `Instant` 的单调时钟，不受系统时间调整影响
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        monotonic_millis()
    }
}

/// 手动推进的时钟
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock;
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set(7);
        assert_eq!(clock.now_ms(), 7);
    }
}
