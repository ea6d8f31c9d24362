//! Collaborator seams: authorization and the raw sample feed.
//!
//! The engine only ever sees these traits; the platform behind them
//! (health store, BLE sensor bridge, simulator) is someone else's
//! problem. Failures cross the boundary as `anyhow` errors and are
//! converted to observer signals inside the engine; they never
//! propagate as faults.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::EngineEvent;
use crate::types::{MetricKind, RawSample};

/// Grants or denies access to metric kinds.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Ask the platform for access to the given metric kinds.
    ///
    /// `Ok(true)` is a grant, `Ok(false)` a denial. An `Err` is treated
    /// as a denial with a reason.
    async fn request_access(&self, kinds: &[MetricKind]) -> Result<bool>;
}

/// Source of raw measurement samples during an active session.
#[async_trait]
pub trait SampleFeed: Send + Sync {
    /// Open a subscription delivering samples for `kinds` into `sink`.
    ///
    /// Implementations must stop delivering once the subscription's
    /// token fires. The engine additionally drops any delivery that
    /// belongs to a torn-down session, so a racing in-flight sample is
    /// harmless either way.
    async fn subscribe(&self, kinds: &[MetricKind], sink: SampleSink) -> Result<FeedSubscription>;
}

/// The one callback shape the engine exposes to feeds.
///
/// Cheap to clone; delivery enqueues onto the engine's event queue and
/// never blocks the caller.
#[derive(Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
    epoch: u64,
}

impl SampleSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineEvent>, epoch: u64) -> Self {
        Self { tx, epoch }
    }

    /// Deliver one sample into the session engine.
    ///
    /// Returns `false` when the engine is gone and the feed should stop.
    pub fn deliver(&self, sample: RawSample) -> bool {
        self.tx
            .send(EngineEvent::Sample {
                epoch: self.epoch,
                sample,
            })
            .is_ok()
    }
}

/// Handle to an open feed subscription.
///
/// Closing (or dropping) cancels the token the feed's pump watches.
pub struct FeedSubscription {
    cancel: CancellationToken,
}

impl FeedSubscription {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Token the feed implementation should watch to stop delivering.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Unsubscribe. Pumps watching the token stop delivering.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Default for FeedSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
