//! Domain types for workout sessions and metrics.
//!
//! Units are fixed by the system: heart rate in beats per minute, energy
//! in kilocalories, distance in miles. There is no localization layer.

use serde::{Deserialize, Serialize};

/// Measurement kinds the engine knows how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Instantaneous heart rate, most-recent-value semantics.
    HeartRate,
    /// Energy burned, delivered by the feed as a running total.
    ActiveCalories,
    /// Distance covered, delivered by the feed as a running total.
    Distance,
}

impl MetricKind {
    /// All kinds the aggregator has an update rule for.
    pub fn all() -> [MetricKind; 3] {
        [
            MetricKind::HeartRate,
            MetricKind::ActiveCalories,
            MetricKind::Distance,
        ]
    }

    /// Parse a config-file name into a kind.
    pub fn from_name(name: &str) -> Option<MetricKind> {
        match name {
            "heart_rate" => Some(MetricKind::HeartRate),
            "active_calories" => Some(MetricKind::ActiveCalories),
            "distance" => Some(MetricKind::Distance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::ActiveCalories => "active_calories",
            MetricKind::Distance => "distance",
        }
    }

    /// The fixed unit samples of this kind are expressed in.
    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricKind::HeartRate => MetricUnit::BeatsPerMinute,
            MetricKind::ActiveCalories => MetricUnit::Kilocalories,
            MetricKind::Distance => MetricUnit::Miles,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Units for raw sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    BeatsPerMinute,
    Kilocalories,
    Miles,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::BeatsPerMinute => "count/min",
            MetricUnit::Kilocalories => "kcal",
            MetricUnit::Miles => "mi",
        }
    }
}

impl std::fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One measurement delivered by the sample feed.
///
/// Transient: consumed immediately by the aggregator, never retained.
/// The value is expressed in the kind's fixed unit ([`MetricKind::unit`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub kind: MetricKind,
    pub value: f64,
}

impl RawSample {
    pub fn new(kind: MetricKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// Instantaneous heart rate in beats per minute.
    pub fn heart_rate(bpm: f64) -> Self {
        Self::new(MetricKind::HeartRate, bpm)
    }

    /// Running total of energy burned, in kilocalories.
    pub fn active_calories(total_kcal: f64) -> Self {
        Self::new(MetricKind::ActiveCalories, total_kcal)
    }

    /// Running total of distance covered, in miles.
    pub fn distance(total_mi: f64) -> Self {
        Self::new(MetricKind::Distance, total_mi)
    }
}

/// The full set of derived metric values at a point in time.
///
/// Published atomically after every mutation, so observers never see a
/// torn mix of old and new fields. `pace` is `None` until it is
/// computable (non-zero elapsed time and non-zero distance), never
/// infinity or NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Most recent heart rate, rounded to the nearest whole beat/minute.
    pub heart_rate_bpm: f64,
    /// Energy burned so far, rounded to the nearest whole kilocalorie.
    pub active_calories_kcal: f64,
    /// Distance covered so far in miles, rounded to 2 decimal places.
    pub distance_mi: f64,
    /// Elapsed session time in whole seconds.
    pub elapsed_seconds: u64,
    /// Distance over elapsed hours, rounded to 1 decimal place.
    pub pace: Option<f64>,
}

/// Lifecycle states for a workout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session in progress; authorization may or may not be granted.
    Idle,
    /// Waiting on the authorization collaborator.
    Authorizing,
    /// Clock running, feed open, metrics flowing.
    Active,
    /// Finished; terminal until an explicit reset.
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Authorizing => "authorizing",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unique identifier for a workout session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a new unique session ID
    pub fn generate() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let random = uuid::Uuid::new_v4();
        Self(format!("workout-{}-{}", timestamp, random.as_simple()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round to the nearest whole unit, halves away from zero.
pub fn round_whole(value: f64) -> f64 {
    value.round()
}

/// Round to `decimals` decimal places, halves away from zero at the
/// scaled value.
pub fn round_decimals(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
