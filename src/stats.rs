//! Traffic accounting and periodic throughput reporting
//!
//! The [`TrafficCounter`] is the only datum shared between the receive loop
//! (writer) and the stats reporter (reader + reset). A single atomic with
//! `fetch_add` and `swap(0)` is sufficient; no lock is acceptable at the
//! update frequency of the receive path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How often throughput is reported, in seconds.
pub const STATS_INTERVAL_SECS: u64 = 60;

/// Atomic accumulator of bytes received since the last report.
///
/// Also tracks a running total that is never reset, for status queries.
#[derive(Debug, Default)]
pub struct TrafficCounter {
    since_report: AtomicU64,
    total: AtomicU64,
}

impl TrafficCounter {
    /// Create a new counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `n` received bytes. Non-blocking, callable from the hot path.
    pub fn add(&self, n: usize) {
        self.since_report.fetch_add(n as u64, Ordering::Relaxed);
        self.total.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Atomically read and reset the bytes received since the last report.
    #[must_use]
    pub fn take(&self) -> u64 {
        self.since_report.swap(0, Ordering::Relaxed)
    }

    /// Bytes received since the last report, without resetting.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.since_report.load(Ordering::Relaxed)
    }

    /// Total bytes received since startup.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Unit of a reported throughput figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    /// Bytes per second
    BytesPerSec,
    /// KiB per second
    KibPerSec,
}

/// Derive the throughput figure for `received` bytes over `interval_secs`.
///
/// Returns `None` when nothing was received. Rates of at least 1024 B/sec
/// are reported in KiB/sec, matching the wire-side log convention.
#[must_use]
pub fn throughput(received: u64, interval_secs: u64) -> Option<(u64, RateUnit)> {
    if received == 0 || interval_secs == 0 {
        return None;
    }
    let per_sec = received / interval_secs;
    if per_sec < 1024 {
        Some((per_sec, RateUnit::BytesPerSec))
    } else {
        Some((received / 1024 / interval_secs, RateUnit::KibPerSec))
    }
}

/// Recurring reporter that drains the [`TrafficCounter`] once per interval
/// and logs a derived throughput figure.
///
/// The reporter runs independently of the receive loop but is started and
/// stopped 1:1 with it by the lifecycle coordinator.
pub struct StatsReporter {
    handle: JoinHandle<()>,
}

impl StatsReporter {
    /// Spawn the reporter task with the given interval.
    #[must_use]
    pub fn spawn(counter: Arc<TrafficCounter>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it so the first report
            // covers a full interval.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                report(&counter, interval.as_secs());
            }
        });
        Self { handle }
    }

    /// Stop the reporter. The task is cancelled; no final report is emitted.
    pub fn stop(self) {
        self.handle.abort();
        debug!("stats reporter stopped");
    }
}

/// Drain the counter and emit one log line if anything was received.
fn report(counter: &TrafficCounter, interval_secs: u64) {
    let received = counter.take();
    match throughput(received, interval_secs) {
        Some((rate, RateUnit::BytesPerSec)) => {
            info!("IPv4 UDP: received {} B/sec", rate);
        }
        Some((rate, RateUnit::KibPerSec)) => {
            info!("IPv4 UDP: received {} KiB/sec", rate);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_sums_datagram_sizes() {
        let counter = TrafficCounter::new();
        for size in [100usize, 250, 7, 1024] {
            counter.add(size);
        }
        assert_eq!(counter.pending(), 1381);
        assert_eq!(counter.total(), 1381);
    }

    #[test]
    fn test_take_resets_interval_but_not_total() {
        let counter = TrafficCounter::new();
        counter.add(4096);
        assert_eq!(counter.take(), 4096);
        assert_eq!(counter.pending(), 0);
        assert_eq!(counter.total(), 4096);

        counter.add(10);
        assert_eq!(counter.take(), 10);
        assert_eq!(counter.total(), 4106);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let counter = Arc::new(TrafficCounter::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add(3);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counter.take(), 12_000);
    }

    #[test]
    fn test_throughput_bytes_per_sec() {
        // 60 * 512 bytes over 60s -> 512 B/sec
        assert_eq!(
            throughput(60 * 512, 60),
            Some((512, RateUnit::BytesPerSec))
        );
    }

    #[test]
    fn test_throughput_kib_per_sec() {
        // 60 * 2048 bytes over 60s -> 2 KiB/sec
        assert_eq!(throughput(60 * 2048, 60), Some((2, RateUnit::KibPerSec)));
    }

    #[test]
    fn test_throughput_boundary() {
        // Exactly 1024 B/sec is reported in KiB/sec
        assert_eq!(throughput(1024 * 60, 60), Some((1, RateUnit::KibPerSec)));
        // Just below stays in B/sec
        assert_eq!(
            throughput(1023 * 60, 60),
            Some((1023, RateUnit::BytesPerSec))
        );
    }

    #[test]
    fn test_throughput_zero_is_silent() {
        assert_eq!(throughput(0, 60), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_drains_counter_each_interval() {
        let counter = Arc::new(TrafficCounter::new());
        counter.add(1500);

        let reporter = StatsReporter::spawn(Arc::clone(&counter), Duration::from_secs(60));

        // Advance past one interval; the reporter must have drained the counter.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(counter.pending(), 0);
        assert_eq!(counter.total(), 1500);

        // Still rescheduled after an empty interval
        counter.add(9);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.pending(), 0);

        reporter.stop();
    }
}
