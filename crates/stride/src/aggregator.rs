//! Sample aggregation and pace derivation.
//!
//! The aggregator owns the [`MetricSnapshot`] outright. The session engine
//! reads copies out of it for publishing but never writes fields directly,
//! so a snapshot can never be observed mid-update.

use crate::types::{round_decimals, round_whole, MetricKind, MetricSnapshot, RawSample};

/// Maintains per-metric running values and derives pace.
#[derive(Debug, Default)]
pub struct SampleAggregator {
    snapshot: MetricSnapshot,
}

impl SampleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one raw sample.
    ///
    /// Heart rate replaces the previous value (most-recent semantics).
    /// Calories and distance replace the previous value with the feed's
    /// running total; the feed sums, the aggregator does not. Every
    /// update recomputes pace.
    pub fn apply(&mut self, sample: &RawSample) {
        match sample.kind {
            MetricKind::HeartRate => {
                self.snapshot.heart_rate_bpm = round_whole(sample.value);
            }
            MetricKind::ActiveCalories => {
                self.snapshot.active_calories_kcal = round_whole(sample.value);
            }
            MetricKind::Distance => {
                self.snapshot.distance_mi = round_decimals(sample.value, 2);
            }
        }
        self.recompute_pace();
    }

    /// Record a new elapsed-time value and recompute pace.
    pub fn set_elapsed(&mut self, seconds: u64) {
        self.snapshot.elapsed_seconds = seconds;
        self.recompute_pace();
    }

    /// Copy of the current snapshot, for publishing.
    pub fn snapshot(&self) -> MetricSnapshot {
        self.snapshot.clone()
    }

    /// Zero everything for a fresh session.
    pub fn reset(&mut self) {
        self.snapshot = MetricSnapshot::default();
    }

    // Pace is distance over elapsed hours. Undefined (None) at zero
    // duration or zero distance; the division is never taken in either
    // case, so no infinity or NaN can escape.
    fn recompute_pace(&mut self) {
        let elapsed = self.snapshot.elapsed_seconds;
        let distance = self.snapshot.distance_mi;

        self.snapshot.pace = if elapsed == 0 || distance == 0.0 {
            None
        } else {
            let hours = elapsed as f64 / 3600.0;
            Some(round_decimals(distance / hours, 1))
        };
    }
}
