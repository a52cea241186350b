//! Sync progress accounting for the status line.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counts events over a sliding window to derive a blocks/s figure.
pub struct ThroughputCounter {
    window: Duration,
    events: Mutex<VecDeque<Instant>>,
}

impl ThroughputCounter {
    pub fn new(window: Duration) -> Self {
        Self { window, events: Mutex::new(VecDeque::new()) }
    }

    pub fn increment(&self) {
        let now = Instant::now();
        let mut events = self.events.lock().expect("poisoned lock");
        events.push_back(now);
        while events.front().is_some_and(|t| now.duration_since(*t) > self.window) {
            events.pop_front();
        }
    }

    /// Events per second over the window.
    pub fn get_throughput(&self) -> f64 {
        let now = Instant::now();
        let mut events = self.events.lock().expect("poisoned lock");
        while events.front().is_some_and(|t| now.duration_since(*t) > self.window) {
            events.pop_front();
        }
        let span = match events.front() {
            Some(first) => now.duration_since(*first).as_secs_f64(),
            None => return 0.0,
        };
        if span <= f64::EPSILON {
            return events.len() as f64;
        }
        events.len() as f64 / span
    }
}

/// Progress of one bulk-import pass: a windowed blocks/s figure plus the
/// overall rate since the pass began, from which the status line derives an
/// ETA.
pub struct SyncMetrics {
    pub counter: ThroughputCounter,
    starting_time: Instant,
    imported: u64,
}

impl SyncMetrics {
    pub fn register() -> Self {
        Self {
            counter: ThroughputCounter::new(Duration::from_secs(5 * 60)),
            starting_time: Instant::now(),
            imported: 0,
        }
    }

    pub fn update(&mut self) {
        self.counter.increment();
        self.imported += 1;
    }

    /// Average blocks/s since this pass began.
    pub fn overall_throughput(&self) -> f64 {
        let elapsed = self.starting_time.elapsed().as_secs_f64();
        if elapsed <= f64::EPSILON {
            return self.imported as f64;
        }
        self.imported as f64 / elapsed
    }

    /// Rough time left to finish `total` jobs at the overall rate. `None`
    /// until at least one job has completed.
    pub fn eta(&self, total: usize) -> Option<Duration> {
        let remaining = (total as u64).checked_sub(self.imported).unwrap_or(0);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = self.overall_throughput();
        if rate <= f64::EPSILON {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_is_zero_without_events() {
        let counter = ThroughputCounter::new(Duration::from_secs(60));
        assert_eq!(counter.get_throughput(), 0.0);
    }

    #[test]
    fn throughput_counts_recent_events() {
        let counter = ThroughputCounter::new(Duration::from_secs(60));
        counter.increment();
        counter.increment();
        counter.increment();
        assert!(counter.get_throughput() > 0.0);
    }

    #[test]
    fn eta_is_unknown_before_the_first_completion() {
        let metrics = SyncMetrics::register();
        assert_eq!(metrics.eta(10), None);
    }

    #[test]
    fn eta_reaches_zero_when_everything_is_imported() {
        let mut metrics = SyncMetrics::register();
        for _ in 0..4 {
            metrics.update();
        }
        assert_eq!(metrics.eta(4), Some(Duration::ZERO));
        assert!(metrics.overall_throughput() > 0.0);
    }

    #[test]
    fn eta_shrinks_as_work_completes() {
        let mut metrics = SyncMetrics::register();
        metrics.update();
        let early = metrics.eta(100).unwrap();
        for _ in 0..98 {
            metrics.update();
        }
        let late = metrics.eta(100).unwrap();
        assert!(late <= early);
    }
}
