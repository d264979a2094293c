use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window of durations with percentile queries
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    samples: Arc<Mutex<VecDeque<Duration>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a tracker keeping the last `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size: window_size.max(1),
        }
    }

    /// Record one sample, evicting the oldest when the window is full
    pub fn record(&self, sample: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Percentile `p` in `0.0..=1.0`, in microseconds
    pub fn percentile_us(&self, p: f64) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<Duration> = samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx].as_secs_f64() * 1_000_000.0
    }

    /// Number of samples currently in the window
    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Counters for one materialized stream
///
/// Cloning shares the counters, so producers and the pump update one set.
#[derive(Debug, Clone)]
pub struct SourceMetrics {
    /// Ordinary elements that entered the buffer
    accepted: Arc<AtomicU64>,
    /// Elements evicted by an overflow policy or refused by drop-new
    dropped: Arc<AtomicU64>,
    /// Sends answered with an error
    rejected: Arc<AtomicU64>,
    /// Elements handed to the sink
    delivered: Arc<AtomicU64>,
    /// Elements discarded by failure or immediate completion
    discarded: Arc<AtomicU64>,
    /// Sends that had to wait for an acknowledgement
    waits: Arc<AtomicU64>,
    /// Time producers spent suspended awaiting an acknowledgement
    ack_wait: PercentileTracker,
    start_time: Instant,
}

impl SourceMetrics {
    /// Create zeroed counters, starting the throughput clock now
    pub fn new() -> Self {
        Self {
            accepted: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
            waits: Arc::new(AtomicU64::new(0)),
            ack_wait: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack_wait(&self, waited: Duration) {
        self.ack_wait.record(waited);
    }

    /// Elements accepted into the buffer
    pub fn total_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Elements dropped by an overflow policy
    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sends answered with an error
    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Elements handed to the sink
    pub fn total_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Elements discarded by failure or immediate completion
    pub fn total_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Sends that suspended awaiting an acknowledgement
    pub fn total_waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    /// Delivered elements per second since materialization
    pub fn throughput_eps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_delivered() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_accepted: self.total_accepted(),
            total_dropped: self.total_dropped(),
            total_rejected: self.total_rejected(),
            total_delivered: self.total_delivered(),
            total_discarded: self.total_discarded(),
            total_waits: self.total_waits(),
            throughput_eps: self.throughput_eps(),
            ack_wait_p50_us: self.ack_wait.percentile_us(0.50),
            ack_wait_p95_us: self.ack_wait.percentile_us(0.95),
            ack_wait_p99_us: self.ack_wait.percentile_us(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for SourceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_accepted: u64,
    pub total_dropped: u64,
    pub total_rejected: u64,
    pub total_delivered: u64,
    pub total_discarded: u64,
    pub total_waits: u64,
    pub throughput_eps: f64,
    pub ack_wait_p50_us: f64,
    pub ack_wait_p95_us: f64,
    pub ack_wait_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Accepted: {}, Dropped: {}, Rejected: {}, Delivered: {}, Discarded: {}, \
             Waits: {}, Throughput: {:.2} elem/s, Ack wait P50: {:.2}µs, P95: {:.2}µs, \
             P99: {:.2}µs, Elapsed: {:.2}s",
            self.total_accepted,
            self.total_dropped,
            self.total_rejected,
            self.total_delivered,
            self.total_discarded,
            self.total_waits,
            self.throughput_eps,
            self.ack_wait_p50_us,
            self.ack_wait_p95_us,
            self.ack_wait_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_tracker() {
        let tracker = PercentileTracker::new(10);
        for i in 1..=10 {
            tracker.record(Duration::from_micros(i));
        }
        assert!((tracker.percentile_us(0.50) - 5.0).abs() < 1e-6);
        assert!((tracker.percentile_us(0.99) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_tracker_window_evicts_oldest() {
        let tracker = PercentileTracker::new(2);
        tracker.record(Duration::from_micros(100));
        tracker.record(Duration::from_micros(1));
        tracker.record(Duration::from_micros(2));
        assert_eq!(tracker.count(), 2);
        assert!(tracker.percentile_us(1.0) < 3.0);
    }

    #[test]
    fn test_counters_are_shared_between_clones() {
        let metrics = SourceMetrics::new();
        let clone = metrics.clone();
        clone.record_accepted();
        clone.record_dropped(3);
        metrics.record_delivered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_accepted, 1);
        assert_eq!(snapshot.total_dropped, 3);
        assert_eq!(snapshot.total_delivered, 1);
        assert!(snapshot.format().contains("Dropped: 3"));
    }
}
