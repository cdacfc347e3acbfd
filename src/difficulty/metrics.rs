use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

const LATENCY_BUCKETS: [u64; 6] = [100, 500, 1_000, 5_000, 10_000, u64::MAX];
const BUCKET_MIDPOINTS: [f64; 6] = [50.0, 300.0, 750.0, 3000.0, 7500.0, 15000.0];

/// Call counters for one registered override strategy.
#[derive(Debug)]
pub struct StrategyMetrics {
    call_count: AtomicU64,
    total_latency_us: AtomicU64,
    error_count: AtomicU64,
    unsupported_count: AtomicU64,
    last_called_at: AtomicI64,
    latency_buckets: [AtomicU64; 6],
}

impl Default for StrategyMetrics {
    fn default() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            unsupported_count: AtomicU64::new(0),
            last_called_at: AtomicI64::new(0),
            latency_buckets: Default::default(),
        }
    }
}

/// How a single guarded strategy call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    Unsupported,
    Failed,
}

impl StrategyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency_us: u64, status: CallStatus) {
        match status {
            CallStatus::Unsupported => {
                self.unsupported_count.fetch_add(1, Ordering::Relaxed);
                return;
            }
            CallStatus::Failed => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
            }
            CallStatus::Ok => {}
        }
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        self.record_latency_bucket(latency_us);
        self.last_called_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn record_latency_bucket(&self, latency_us: u64) {
        for (i, &threshold) in LATENCY_BUCKETS.iter().enumerate() {
            if latency_us <= threshold {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Approximate (p50, p95, p99) latency in microseconds from the bucket counts.
    pub fn percentiles(&self) -> (f64, f64, f64) {
        let counts: Vec<u64> = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }

        let percentile = |pct: f64| -> f64 {
            let target = (pct / 100.0 * total as f64).ceil() as u64;
            let mut cumulative = 0u64;
            for (i, &count) in counts.iter().enumerate() {
                cumulative += count;
                if cumulative >= target {
                    return BUCKET_MIDPOINTS[i];
                }
            }
            BUCKET_MIDPOINTS[5]
        };

        (percentile(50.0), percentile(95.0), percentile(99.0))
    }

    pub fn snapshot(&self, name: &str) -> MetricsSnapshot {
        let (p50_us, p95_us, p99_us) = self.percentiles();
        MetricsSnapshot {
            name: name.to_string(),
            call_count: self.call_count.load(Ordering::Relaxed),
            total_latency_us: self.total_latency_us.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            unsupported_count: self.unsupported_count.load(Ordering::Relaxed),
            last_called_at: self.last_called_at.load(Ordering::Relaxed),
            p50_us,
            p95_us,
            p99_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub name: String,
    pub call_count: u64,
    pub total_latency_us: u64,
    pub error_count: u64,
    pub unsupported_count: u64,
    pub last_called_at: i64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
}
