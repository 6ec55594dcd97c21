//! Throughput and latency telemetry
//!
//! Four monotonic counters updated lock-free by the match workers after
//! each order: processed count, total latency, and min/max latency in
//! nanoseconds. Min and max use compare-exchange loops; the counters are
//! not required to be mutually consistent at observation time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Lock-free counters shared by all match workers
#[derive(Debug)]
pub struct EngineTelemetry {
    orders_processed: AtomicU64,
    total_latency_ns: AtomicU64,
    min_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
}

impl EngineTelemetry {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            orders_processed: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            min_latency_ns: AtomicU64::new(u64::MAX),
            max_latency_ns: AtomicU64::new(0),
        }
    }

    /// Record one processed order's receive-to-done latency
    pub fn record(&self, latency_ns: u64) {
        self.orders_processed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let mut current = self.min_latency_ns.load(Ordering::Relaxed);
        while latency_ns < current {
            match self.min_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let mut current = self.max_latency_ns.load(Ordering::Relaxed);
        while latency_ns > current {
            match self.max_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Read all four counters
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            orders_processed: self.orders_processed.load(Ordering::Relaxed),
            total_latency_ns: self.total_latency_ns.load(Ordering::Relaxed),
            min_latency_ns: self.min_latency_ns.load(Ordering::Relaxed),
            max_latency_ns: self.max_latency_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time reading of the telemetry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub orders_processed: u64,
    pub total_latency_ns: u64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl TelemetrySnapshot {
    /// Average latency in nanoseconds; 0 before the first order
    pub fn avg_latency_ns(&self) -> u64 {
        if self.orders_processed == 0 {
            0
        } else {
            self.total_latency_ns / self.orders_processed
        }
    }

    /// Minimum latency in microseconds; 0 before the first order
    pub fn min_latency_us(&self) -> f64 {
        if self.orders_processed == 0 {
            0.0
        } else {
            self.min_latency_ns as f64 / 1_000.0
        }
    }

    /// Maximum latency in microseconds
    pub fn max_latency_us(&self) -> f64 {
        self.max_latency_ns as f64 / 1_000.0
    }

    /// Average latency in microseconds
    pub fn avg_latency_us(&self) -> f64 {
        self.avg_latency_ns() as f64 / 1_000.0
    }
}

/// Once-per-second sampling loop run by the pipeline's logger thread
///
/// Emits throughput over the last interval plus microsecond latencies.
pub(crate) fn logger_loop(
    telemetry: Arc<EngineTelemetry>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut previous = telemetry.snapshot();
    let mut previous_at = Instant::now();

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(interval);

        let now = Instant::now();
        let snapshot = telemetry.snapshot();
        let elapsed = now.duration_since(previous_at).as_secs_f64();
        let delta = snapshot.orders_processed - previous.orders_processed;
        let throughput = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };

        info!(
            orders_per_sec = throughput,
            avg_latency_us = snapshot.avg_latency_us(),
            min_latency_us = snapshot.min_latency_us(),
            max_latency_us = snapshot.max_latency_us(),
            total_processed = snapshot.orders_processed,
            "engine throughput"
        );

        previous = snapshot;
        previous_at = now;
    }
}
