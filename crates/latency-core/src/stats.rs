//! Latency samples and summary statistics.

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Timings for one create/cancel iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencySample {
    /// Zero-based iteration index
    pub iteration: usize,
    /// Venue order id returned by the create response
    pub order_id: String,
    #[serde(rename = "create_ms", serialize_with = "as_millis")]
    pub create: Duration,
    #[serde(rename = "cancel_ms", serialize_with = "as_millis")]
    pub cancel: Duration,
}

impl LatencySample {
    /// Create plus cancel
    pub fn round_trip(&self) -> Duration {
        self.create + self.cancel
    }
}

/// Summary of one latency series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    #[serde(rename = "mean_ms", serialize_with = "as_millis")]
    pub mean: Duration,
    #[serde(rename = "min_ms", serialize_with = "as_millis")]
    pub min: Duration,
    #[serde(rename = "max_ms", serialize_with = "as_millis")]
    pub max: Duration,
    #[serde(rename = "p50_ms", serialize_with = "as_millis")]
    pub p50: Duration,
    #[serde(rename = "p99_ms", serialize_with = "as_millis")]
    pub p99: Duration,
}

impl LatencyStats {
    /// Summarize `series`; `None` when it is empty.
    pub fn from_series(series: &[Duration]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let mut sorted = series.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            mean: total / sorted.len() as u32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p50: nearest_rank(&sorted, 50.0),
            p99: nearest_rank(&sorted, 99.0),
        })
    }
}

/// Nearest-rank percentile over an ascending, non-empty slice.
fn nearest_rank(sorted: &[Duration], percentile: f64) -> Duration {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Outcome of a sampling run.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub samples: Vec<LatencySample>,
    pub create: LatencyStats,
    pub cancel: LatencyStats,
    pub round_trip: LatencyStats,
}

impl LatencyReport {
    /// Build a report; `None` when no iteration completed.
    pub fn from_samples(samples: Vec<LatencySample>) -> Option<Self> {
        let create: Vec<_> = samples.iter().map(|s| s.create).collect();
        let cancel: Vec<_> = samples.iter().map(|s| s.cancel).collect();
        let round_trip: Vec<_> = samples.iter().map(LatencySample::round_trip).collect();

        Some(Self {
            create: LatencyStats::from_series(&create)?,
            cancel: LatencyStats::from_series(&cancel)?,
            round_trip: LatencyStats::from_series(&round_trip)?,
            samples,
        })
    }

    pub fn mean_create(&self) -> Duration {
        self.create.mean
    }

    pub fn mean_cancel(&self) -> Duration {
        self.cancel.mean
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}
