//! Fixed-delay pacing for sequential upstream queries
//!
//! Per-repository commit queries run one after another with a pause in
//! between to stay under informal rate limits. The pause policy lives here,
//! behind [`Pacer`], so the fetch code never sleeps directly and tests can
//! observe the schedule without waiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default pause between consecutive repository queries
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Waits between two consecutive tasks
pub trait Pacer: Send + Sync {
    fn pause(&self);
}

/// Sleeps the current thread for a fixed duration
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(DEFAULT_REQUEST_DELAY)
    }
}

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// Never waits
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Counts pauses instead of waiting
#[derive(Debug, Default)]
pub struct CountingPacer {
    pauses: AtomicUsize,
}

impl CountingPacer {
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl Pacer for CountingPacer {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs tasks in order with the pacer's pause between consecutive tasks
pub struct ThrottledQueue<'a> {
    pacer: &'a dyn Pacer,
}

impl<'a> ThrottledQueue<'a> {
    pub fn new(pacer: &'a dyn Pacer) -> Self {
        Self { pacer }
    }

    /// Run `task` for every item; no pause before the first or after the last
    pub fn run<I, F>(&self, items: I, mut task: F)
    where
        I: IntoIterator,
        F: FnMut(I::Item),
    {
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                self.pacer.pause();
            }
            task(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pauses_between_tasks_only() {
        let pacer = CountingPacer::default();
        let queue = ThrottledQueue::new(&pacer);

        let mut seen = Vec::new();
        queue.run(vec![1, 2, 3, 4], |n| seen.push(n));

        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(pacer.pauses(), 3);
    }

    #[test]
    fn test_empty_queue_never_pauses() {
        let pacer = CountingPacer::default();
        ThrottledQueue::new(&pacer).run(Vec::<u32>::new(), |_| {});
        assert_eq!(pacer.pauses(), 0);
    }
}
