//! Workout session engine.
//!
//! One spawned task owns all session state. Commands from handles, ticks
//! from the clock driver, samples from the feed, and authorization
//! results all arrive as [`EngineEvent`]s on a single queue, so no two
//! mutations ever interleave and observers only ever see complete
//! snapshots.
//!
//! ```text
//!   SessionHandle ──┐
//!   TickDriver ─────┤  mpsc   ┌──────────────────────────────┐
//!   SampleSink ─────┼───────▶ │ engine task                  │──▶ broadcast
//!   auth task ──────┘         │ Session + Clock + Aggregator │    SessionUpdate
//!                             └──────────────────────────────┘
//! ```
//!
//! Nothing here blocks a caller: commands enqueue and return, reads
//! round-trip a oneshot, and observer delivery is fire-and-forget.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::aggregator::SampleAggregator;
use crate::clock::{ElapsedClock, TickDriver};
use crate::error::SessionError;
use crate::feed::{AuthorizationService, FeedSubscription, SampleFeed, SampleSink};
use crate::types::{MetricKind, MetricSnapshot, RawSample, SessionId, SessionState};

/// One workout attempt.
///
/// Mutated only by the engine task. `reset` reuses the record for a
/// fresh attempt rather than allocating a new one; the authorization
/// grant survives because platform grants outlive a single workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    /// Set once, on the transition to Active.
    pub started_at: Option<SystemTime>,
    /// Monotonic non-decreasing; advances only while Active.
    pub accumulated_elapsed_seconds: u64,
    pub authorization_granted: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            id: SessionId::generate(),
            state: SessionState::Idle,
            started_at: None,
            accumulated_elapsed_seconds: 0,
            authorization_granted: false,
        }
    }

    /// Logical reset for a fresh attempt. The grant survives.
    fn reset(&mut self) {
        self.id = SessionId::generate();
        self.state = SessionState::Idle;
        self.started_at = None;
        self.accumulated_elapsed_seconds = 0;
    }
}

/// Events pushed to observers via the update channel.
///
/// Every mutation publishes a full [`MetricSnapshot`] copy, even fields
/// that did not change, so a consumer never has to stitch partial
/// updates together. Delivery is lossy for laggards, never blocking.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Full refreshed snapshot after a metric or elapsed-time change.
    Snapshot(MetricSnapshot),
    /// A lifecycle edge was taken.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// The authorization collaborator denied access or failed.
    AuthorizationFailed { reason: String },
    /// A non-fatal fault: start without a grant, feed setup failure.
    Fault(SessionError),
}

/// Internal event funnel. Everything that can touch session state is a
/// variant here and is applied in arrival order by the engine task.
pub(crate) enum EngineEvent {
    Authorize,
    AuthResult {
        granted: bool,
        error: Option<String>,
    },
    Start,
    End,
    Reset,
    Shutdown,
    Tick {
        epoch: u64,
    },
    Sample {
        epoch: u64,
        sample: RawSample,
    },
    ReadSnapshot(oneshot::Sender<MetricSnapshot>),
    ReadSession(oneshot::Sender<Session>),
}

/// Cloneable handle to a running session engine.
///
/// Commands (`authorize`, `start`, `end`, `reset`) enqueue and return
/// immediately; their effects are observable via [`subscribe`] or the
/// async reads. The engine runs until [`shutdown`] is called.
///
/// [`subscribe`]: SessionHandle::subscribe
/// [`shutdown`]: SessionHandle::shutdown
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionHandle {
    /// Request access from the authorization collaborator.
    ///
    /// On grant the session starts automatically; on denial the session
    /// stays idle and observers receive
    /// [`SessionUpdate::AuthorizationFailed`]. No retry loop; call
    /// again to retry.
    pub fn authorize(&self) {
        let _ = self.tx.send(EngineEvent::Authorize);
    }

    /// Start the session. No-op while already active; signals
    /// [`SessionError::AuthorizationRequired`] if access was never
    /// granted.
    pub fn start(&self) {
        let _ = self.tx.send(EngineEvent::Start);
    }

    /// End the session, freezing elapsed time. No-op unless active.
    pub fn end(&self) {
        let _ = self.tx.send(EngineEvent::End);
    }

    /// Reinitialize an ended session to idle for a fresh attempt.
    pub fn reset(&self) {
        let _ = self.tx.send(EngineEvent::Reset);
    }

    /// Stop the engine task itself.
    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineEvent::Shutdown);
    }

    /// Current snapshot; zeroed sentinel before the first sample.
    pub async fn snapshot(&self) -> Result<MetricSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::ReadSnapshot(reply))
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)
    }

    /// Copy of the session record.
    pub async fn session(&self) -> Result<Session, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::ReadSession(reply))
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> Result<SessionState, SessionError> {
        Ok(self.session().await?.state)
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }
}

/// Spawn a session engine and return a handle to it.
///
/// The engine requests the metric kinds named in `config.metrics`;
/// unknown names are logged and skipped, and an empty result falls back
/// to all known kinds.
pub fn spawn_session(
    config: &strideconf::SessionConfig,
    auth: Arc<dyn AuthorizationService>,
    feed: Arc<dyn SampleFeed>,
) -> SessionHandle {
    let mut kinds: Vec<MetricKind> = Vec::new();
    for name in &config.metrics {
        match MetricKind::from_name(name) {
            Some(kind) => kinds.push(kind),
            None => warn!(metric = %name, "unknown metric kind in config, skipping"),
        }
    }
    if kinds.is_empty() {
        warn!("no usable metric kinds configured, requesting all");
        kinds = MetricKind::all().to_vec();
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let (update_tx, _) = broadcast::channel(config.update_buffer.max(1));

    let engine = SessionEngine {
        session: Session::new(),
        clock: ElapsedClock::new(),
        aggregator: SampleAggregator::new(),
        auth,
        feed,
        kinds,
        tick_interval: config.tick_interval(),
        epoch: 0,
        ticker: None,
        subscription: None,
        events_tx: tx.clone(),
        update_tx: update_tx.clone(),
    };
    tokio::spawn(engine.run(rx));

    SessionHandle { tx, update_tx }
}

struct SessionEngine {
    session: Session,
    clock: ElapsedClock,
    aggregator: SampleAggregator,
    auth: Arc<dyn AuthorizationService>,
    feed: Arc<dyn SampleFeed>,
    kinds: Vec<MetricKind>,
    tick_interval: Duration,
    /// Bumped on every start; stale tick/sample deliveries are dropped.
    epoch: u64,
    ticker: Option<TickDriver>,
    subscription: Option<FeedSubscription>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionEngine {
    /// Process events until shutdown.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        debug!(session.id = %self.session.id, "session engine running");

        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::Shutdown) {
                break;
            }
            self.handle_event(event).await;
        }

        // Tear down anything still live so no tick or sample outlasts us.
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
        debug!(session.id = %self.session.id, "session engine shut down");
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Authorize => self.request_authorization(),
            EngineEvent::AuthResult { granted, error } => {
                self.finish_authorization(granted, error).await;
            }
            EngineEvent::Start => self.start_session().await,
            EngineEvent::End => self.end_session().await,
            EngineEvent::Reset => self.reset_session(),
            EngineEvent::Tick { epoch } => self.on_tick(epoch),
            EngineEvent::Sample { epoch, sample } => self.on_sample(epoch, sample),
            EngineEvent::ReadSnapshot(reply) => {
                let _ = reply.send(self.aggregator.snapshot());
            }
            EngineEvent::ReadSession(reply) => {
                let _ = reply.send(self.session.clone());
            }
            EngineEvent::Shutdown => unreachable!("handled in run()"),
        }
    }

    // ── Authorization ────────────────────────────────────────────────

    fn request_authorization(&mut self) {
        if self.session.state != SessionState::Idle {
            debug!(
                state = %self.session.state,
                "authorize ignored outside idle"
            );
            return;
        }

        self.transition(SessionState::Authorizing);

        let auth = self.auth.clone();
        let kinds = self.kinds.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match auth.request_access(&kinds).await {
                Ok(granted) => EngineEvent::AuthResult {
                    granted,
                    error: None,
                },
                Err(e) => EngineEvent::AuthResult {
                    granted: false,
                    error: Some(e.to_string()),
                },
            };
            let _ = tx.send(event);
        });
    }

    async fn finish_authorization(&mut self, granted: bool, error: Option<String>) {
        if self.session.state != SessionState::Authorizing {
            debug!("stale authorization result dropped");
            return;
        }

        if granted {
            info!(session.id = %self.session.id, "authorization granted");
            self.session.authorization_granted = true;
            self.start_session().await;
            return;
        }

        let reason = error.unwrap_or_else(|| SessionError::AuthorizationDenied.to_string());
        warn!(session.id = %self.session.id, %reason, "authorization failed");
        self.transition(SessionState::Idle);
        self.publish(SessionUpdate::AuthorizationFailed { reason });
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    async fn start_session(&mut self) {
        match self.session.state {
            SessionState::Active => {
                debug!(session.id = %self.session.id, "start ignored, already active");
                return;
            }
            SessionState::Ended => {
                debug!(session.id = %self.session.id, "start ignored, session ended (reset first)");
                return;
            }
            SessionState::Idle | SessionState::Authorizing => {}
        }

        if !self.session.authorization_granted {
            warn!(session.id = %self.session.id, "start refused, authorization not granted");
            self.publish(SessionUpdate::Fault(SessionError::AuthorizationRequired));
            return;
        }

        // All fallible setup happens before any state mutation, so a
        // failure leaves the session exactly where it was.
        let next_epoch = self.epoch + 1;
        let sink = SampleSink::new(self.events_tx.clone(), next_epoch);
        let subscription = match self.feed.subscribe(&self.kinds, sink).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(
                    session.id = %self.session.id,
                    error = %e,
                    "feed subscription failed, session unchanged"
                );
                self.publish(SessionUpdate::Fault(SessionError::ConfigurationFailed(
                    e.to_string(),
                )));
                return;
            }
        };

        self.epoch = next_epoch;
        if self.session.started_at.is_none() {
            // Fresh session, not a resume
            self.session.accumulated_elapsed_seconds = 0;
        }

        self.clock.activate(self.session.accumulated_elapsed_seconds);

        let epoch = self.epoch;
        let tick_tx = self.events_tx.clone();
        self.ticker = Some(TickDriver::spawn(self.tick_interval, move || {
            let _ = tick_tx.send(EngineEvent::Tick { epoch });
        }));
        self.subscription = Some(subscription);

        self.session.started_at = Some(SystemTime::now());
        self.transition(SessionState::Active);
        self.publish_snapshot();
        info!(
            session.id = %self.session.id,
            metrics = ?self.kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "workout session started"
        );
    }

    async fn end_session(&mut self) {
        if self.session.state != SessionState::Active {
            debug!(
                session.id = %self.session.id,
                state = %self.session.state,
                "end ignored, not active"
            );
            return;
        }

        // Stop the tick driver first: cancel + join, so no tick event is
        // emitted after this point. Anything already queued is dropped by
        // the state guard in on_tick.
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }

        let frozen = self.clock.deactivate();
        self.session.accumulated_elapsed_seconds = frozen;
        self.aggregator.set_elapsed(frozen);

        self.transition(SessionState::Ended);
        self.publish_snapshot();
        info!(
            session.id = %self.session.id,
            elapsed_seconds = frozen,
            "workout session ended"
        );
    }

    fn reset_session(&mut self) {
        if self.session.state != SessionState::Ended {
            debug!(
                session.id = %self.session.id,
                state = %self.session.state,
                "reset ignored, session not ended"
            );
            return;
        }

        let previous = self.session.id.clone();
        self.session.reset();
        self.clock = ElapsedClock::new();
        self.aggregator.reset();
        self.epoch += 1;

        self.transition(SessionState::Idle);
        self.publish_snapshot();
        info!(
            session.id = %self.session.id,
            previous.id = %previous,
            "session reset for a fresh attempt"
        );
    }

    // ── Clock and feed input ─────────────────────────────────────────

    fn on_tick(&mut self, epoch: u64) {
        if epoch != self.epoch || self.session.state != SessionState::Active {
            return;
        }

        let elapsed = self.clock.tick();
        self.session.accumulated_elapsed_seconds = elapsed;
        self.aggregator.set_elapsed(elapsed);
        self.publish_snapshot();
    }

    fn on_sample(&mut self, epoch: u64, sample: RawSample) {
        if epoch != self.epoch || self.session.state != SessionState::Active {
            debug!(kind = %sample.kind, "stale sample dropped");
            return;
        }
        if !self.kinds.contains(&sample.kind) {
            debug!(kind = %sample.kind, "unrequested sample kind ignored");
            return;
        }

        self.aggregator.apply(&sample);
        self.publish_snapshot();
    }

    // ── Publishing ───────────────────────────────────────────────────

    fn transition(&mut self, to: SessionState) {
        let from = self.session.state;
        self.session.state = to;
        info!(session.id = %self.session.id, %from, %to, "session state changed");
        self.publish(SessionUpdate::StateChanged { from, to });
    }

    fn publish_snapshot(&self) {
        self.publish(SessionUpdate::Snapshot(self.aggregator.snapshot()));
    }

    fn publish(&self, update: SessionUpdate) {
        // A send error just means no observer is currently subscribed.
        let _ = self.update_tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedFeed, StaticAuthorizer};
    use strideconf::SessionConfig;

    fn test_config() -> SessionConfig {
        SessionConfig {
            tick_interval_ms: 20,
            ..SessionConfig::default()
        }
    }

    async fn wait_for_state(handle: &SessionHandle, want: SessionState) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if handle.state().await.unwrap() == want {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for state {}",
                want
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_session_reset_keeps_grant() {
        let mut session = Session::new();
        session.authorization_granted = true;
        session.state = SessionState::Ended;
        session.accumulated_elapsed_seconds = 120;
        let old_id = session.id.clone();

        session.reset();

        assert!(session.authorization_granted);
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(session.accumulated_elapsed_seconds, 0);
        assert!(session.started_at.is_none());
        assert_ne!(session.id, old_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_denied_authorization_stays_idle() {
        let handle = spawn_session(
            &test_config(),
            Arc::new(StaticAuthorizer::denying()),
            Arc::new(ScriptedFeed::new(vec![])),
        );
        let mut updates = handle.subscribe();

        handle.authorize();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let mut saw_failure = false;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(200), updates.recv()).await {
                Ok(Ok(SessionUpdate::AuthorizationFailed { .. })) => {
                    saw_failure = true;
                    break;
                }
                Ok(Ok(_)) => continue,
                _ => break,
            }
        }
        assert!(saw_failure, "expected an AuthorizationFailed update");

        wait_for_state(&handle, SessionState::Idle).await;
        let session = handle.session().await.unwrap();
        assert!(!session.authorization_granted);
        assert_eq!(handle.snapshot().await.unwrap(), MetricSnapshot::default());

        handle.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_without_grant_signals_fault() {
        let handle = spawn_session(
            &test_config(),
            Arc::new(StaticAuthorizer::granting()),
            Arc::new(ScriptedFeed::new(vec![])),
        );
        let mut updates = handle.subscribe();

        handle.start();

        let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("timed out waiting for update")
            .unwrap();
        match update {
            SessionUpdate::Fault(SessionError::AuthorizationRequired) => {}
            other => panic!("expected AuthorizationRequired fault, got {:?}", other),
        }
        assert_eq!(handle.state().await.unwrap(), SessionState::Idle);

        handle.shutdown();
    }
}
