//! 协作式定时器
//!
//! 不创建线程：调用方在主循环中周期性调用 [`TimerGroup::tick`]，
//! 所有到期任务在 `tick` 内同步执行。

use std::fmt;

/// 定时任务句柄（用于移除）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

type TaskFn = Box<dyn FnMut() + Send>;

/// 定时任务
///
/// `interval_ms <= 0` 表示每次 tick 都执行。
pub struct TimedTask {
    id: TaskId,
    interval_ms: i64,
    last_fire_ms: u64,
    action: TaskFn,
}

impl TimedTask {
    fn is_due(&self, now_ms: u64) -> bool {
        if self.interval_ms <= 0 {
            return true;
        }
        now_ms.saturating_sub(self.last_fire_ms) >= self.interval_ms as u64
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }
}

impl fmt::Debug for TimedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedTask")
            .field("id", &self.id)
            .field("interval_ms", &self.interval_ms)
            .field("last_fire_ms", &self.last_fire_ms)
            .finish_non_exhaustive()
    }
}

/// 定时任务组
#[derive(Debug, Default)]
pub struct TimerGroup {
    tasks: Vec<TimedTask>,
    next_id: u64,
}

impl TimerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任务
    ///
    /// # 参数
    /// - `interval_ms`: 执行间隔（毫秒）
    /// - `now_ms`: 当前时间；第一次执行发生在 `now_ms + interval_ms` 之后
    /// - `action`: 任务本体
    pub fn add_task(
        &mut self,
        interval_ms: i64,
        now_ms: u64,
        action: impl FnMut() + Send + 'static,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(TimedTask {
            id,
            interval_ms,
            last_fire_ms: now_ms,
            action: Box::new(action),
        });
        id
    }

    pub fn remove_task(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 执行所有到期任务，返回本次执行的任务数
    ///
    /// 任务执行后其计时从 `now_ms` 重新开始（不补偿错过的周期）。
    pub fn tick(&mut self, now_ms: u64) -> usize {
        let mut fired = 0;
        for task in self.tasks.iter_mut().filter(|t| t.is_due(now_ms)) {
            (task.action)();
            task.last_fire_ms = now_ms;
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fires_after_interval() {
        let mut timers = TimerGroup::new();
        let (count, action) = counter();
        timers.add_task(100, 0, action);

        assert_eq!(timers.tick(50), 0);
        assert_eq!(timers.tick(100), 1);
        // 计时从上次执行重新开始
        assert_eq!(timers.tick(150), 0);
        assert_eq!(timers.tick(200), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missed_periods_are_not_replayed() {
        let mut timers = TimerGroup::new();
        let (count, action) = counter();
        timers.add_task(10, 0, action);
        timers.tick(1000);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_positive_interval_fires_every_tick() {
        let mut timers = TimerGroup::new();
        let (zero, action) = counter();
        timers.add_task(0, 0, action);
        let (negative, action) = counter();
        timers.add_task(-5, 0, action);

        for _ in 0..3 {
            timers.tick(0);
        }
        assert_eq!(zero.load(Ordering::SeqCst), 3);
        assert_eq!(negative.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove_task() {
        let mut timers = TimerGroup::new();
        let (count, action) = counter();
        let id = timers.add_task(0, 0, action);
        assert!(timers.remove_task(id));
        assert!(!timers.remove_task(id));
        timers.tick(10);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(timers.is_empty());
    }
}
