//! Rolling statistics window.
//!
//! # Layout
//! ```text
//! tick = floor(elapsed / bucket_span)
//! slot = tick mod bucket_num
//!
//! [ b0 ][ b1 ][ b2 ] ... [ bN-1 ]
//!          ▲ current slot; zeroed first if it still holds an older tick
//! ```
//!
//! A bucket counts towards the totals only while its tick lies within the last
//! `bucket_num` ticks, so nothing older than `bucket_span × bucket_num` is ever
//! reported.
//!
//! Each bucket keeps at most [`SAMPLES_PER_BUCKET`] latencies; past that the
//! oldest sample of the bucket is overwritten. The mean stays exact.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Classified result of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    /// Rejected without invoking the operation.
    ShortCircuited,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::ShortCircuited => "short_circuited",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Tick of a bucket that holds no data; never live.
const UNUSED: u64 = u64::MAX;

pub const SAMPLES_PER_BUCKET: usize = 256;

#[derive(Debug, Clone, Default)]
struct Bucket {
    tick: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    short_circuited: u64,
    latency_sum_ms: u64,
    latency_count: u64,
    latencies_ms: Vec<u64>,
}

impl Bucket {
    fn fresh(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    fn sample(&mut self, latency_ms: u64) {
        if self.latencies_ms.len() < SAMPLES_PER_BUCKET {
            self.latencies_ms.push(latency_ms);
        } else {
            let slot = (self.latency_count % SAMPLES_PER_BUCKET as u64) as usize;
            self.latencies_ms[slot] = latency_ms;
        }
        self.latency_sum_ms += latency_ms;
        self.latency_count += 1;
    }
}

/// Aggregated counters across all live buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub short_circuited: u64,
}

impl WindowTotals {
    /// Calls that actually reached the operation.
    pub fn requests(&self) -> u64 {
        self.successes + self.failures + self.timeouts
    }

    /// Failures including timeouts.
    pub fn errors(&self) -> u64 {
        self.failures + self.timeouts
    }

    /// Success ratio; 1.0 while there is no data so an empty window cannot trip.
    pub fn success_ratio(&self) -> f64 {
        match self.requests() {
            0 => 1.0,
            total => self.successes as f64 / total as f64,
        }
    }

    pub fn error_percentage(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.errors() as f64 * 100.0 / total as f64,
        }
    }
}

/// Latency summary over the live buckets, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    /// `(percentile, latency_ms)` pairs, percentile in `[0, 1]`.
    pub percentiles: Vec<(f64, u64)>,
}

/// Raw latencies copied out of the window, summarized without the window.
#[derive(Debug, Clone, Default)]
pub struct LatencySamples {
    sum_ms: u64,
    count: u64,
    samples: Vec<u64>,
}

impl LatencySamples {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Exact mean and nearest-rank percentiles over the retained samples.
    pub fn summarize(mut self, percentiles: &[f64]) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary {
                mean_ms: 0.0,
                percentiles: percentiles.iter().map(|p| (*p, 0)).collect(),
            };
        }
        self.samples.sort_unstable();

        let mean_ms = self.sum_ms as f64 / self.count as f64;
        let last = self.samples.len() - 1;
        let percentiles = percentiles
            .iter()
            .map(|p| {
                let rank = (p.clamp(0.0, 1.0) * last as f64).round() as usize;
                (*p, self.samples[rank.min(last)])
            })
            .collect();

        LatencySummary { mean_ms, percentiles }
    }
}

/// Fixed-size ring of time buckets.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buckets: Vec<Bucket>,
    span_ms: u64,
    epoch: Instant,
}

impl RollingWindow {
    /// `span` and `count` must be non-zero; settings validation enforces this.
    pub fn new(span: Duration, count: usize, epoch: Instant) -> Self {
        Self {
            buckets: vec![Bucket::fresh(UNUSED); count.max(1)],
            span_ms: (span.as_millis() as u64).max(1),
            epoch,
        }
    }

    /// Total duration covered by the window.
    pub fn span(&self) -> Duration {
        Duration::from_millis(self.span_ms * self.buckets.len() as u64)
    }

    fn tick_at(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64 / self.span_ms
    }

    fn current(&mut self, now: Instant) -> &mut Bucket {
        let tick = self.tick_at(now);
        let slot = (tick % self.buckets.len() as u64) as usize;
        let bucket = &mut self.buckets[slot];
        if bucket.tick != tick {
            *bucket = Bucket::fresh(tick);
        }
        bucket
    }

    fn live(&self, now: Instant) -> impl Iterator<Item = &Bucket> {
        let tick = self.tick_at(now);
        let count = self.buckets.len() as u64;
        self.buckets
            .iter()
            .filter(move |b| b.tick <= tick && tick - b.tick < count)
    }

    /// Record one outcome in the bucket for `now`.
    pub fn record(&mut self, now: Instant, outcome: Outcome, latency: Duration) {
        let bucket = self.current(now);
        match outcome {
            Outcome::Success => bucket.successes += 1,
            Outcome::Failure => bucket.failures += 1,
            Outcome::Timeout => bucket.timeouts += 1,
            Outcome::ShortCircuited => {
                bucket.short_circuited += 1;
                return;
            }
        }
        bucket.sample(latency.as_millis() as u64);
    }

    pub fn totals(&self, now: Instant) -> WindowTotals {
        self.live(now).fold(WindowTotals::default(), |mut acc, b| {
            acc.successes += b.successes;
            acc.failures += b.failures;
            acc.timeouts += b.timeouts;
            acc.short_circuited += b.short_circuited;
            acc
        })
    }

    /// Copy the retained latencies of the live buckets.
    pub fn latency_samples(&self, now: Instant) -> LatencySamples {
        self.live(now).fold(LatencySamples::default(), |mut acc, b| {
            acc.sum_ms += b.latency_sum_ms;
            acc.count += b.latency_count;
            acc.samples.extend_from_slice(&b.latencies_ms);
            acc
        })
    }

    /// Drop every bucket.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::fresh(UNUSED);
        }
    }
}
