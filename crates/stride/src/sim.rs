//! Simulated collaborators for demos and tests.
//!
//! [`StaticAuthorizer`] answers every access request the same way.
//! [`ScriptedFeed`] replays a timed sample script into the engine and
//! stops the moment its subscription token fires.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::feed::{AuthorizationService, FeedSubscription, SampleFeed, SampleSink};
use crate::types::{MetricKind, RawSample};

/// Authorization collaborator with a fixed answer.
pub struct StaticAuthorizer {
    decision: Decision,
}

enum Decision {
    Grant,
    Deny,
    Fail(String),
}

impl StaticAuthorizer {
    /// Grants every request.
    pub fn granting() -> Self {
        Self {
            decision: Decision::Grant,
        }
    }

    /// Denies every request.
    pub fn denying() -> Self {
        Self {
            decision: Decision::Deny,
        }
    }

    /// Fails every request with an error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Fail(reason.into()),
        }
    }
}

#[async_trait]
impl AuthorizationService for StaticAuthorizer {
    async fn request_access(&self, kinds: &[MetricKind]) -> Result<bool> {
        debug!(kinds = kinds.len(), "simulated authorization request");
        match &self.decision {
            Decision::Grant => Ok(true),
            Decision::Deny => Ok(false),
            Decision::Fail(reason) => Err(anyhow::anyhow!("{reason}")),
        }
    }
}

/// One step of a scripted feed: wait, then deliver.
#[derive(Debug, Clone)]
pub struct FeedStep {
    pub delay: Duration,
    pub sample: RawSample,
}

impl FeedStep {
    pub fn new(delay: Duration, sample: RawSample) -> Self {
        Self { delay, sample }
    }
}

/// Feed that replays a fixed script on every subscription.
///
/// Samples for kinds the subscription did not request are skipped, the
/// way a real feed only delivers what was asked for.
pub struct ScriptedFeed {
    script: Arc<Vec<FeedStep>>,
}

impl ScriptedFeed {
    pub fn new(script: Vec<FeedStep>) -> Self {
        Self {
            script: Arc::new(script),
        }
    }
}

#[async_trait]
impl SampleFeed for ScriptedFeed {
    async fn subscribe(&self, kinds: &[MetricKind], sink: SampleSink) -> Result<FeedSubscription> {
        let subscription = FeedSubscription::new();
        let token = subscription.token();
        let script = self.script.clone();
        let kinds = kinds.to_vec();

        tokio::spawn(async move {
            for step in script.iter() {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("scripted feed subscription closed");
                        return;
                    }
                    _ = tokio::time::sleep(step.delay) => {}
                }

                if !kinds.contains(&step.sample.kind) {
                    continue;
                }
                if !sink.deliver(step.sample.clone()) {
                    debug!("scripted feed engine gone, stopping");
                    return;
                }
            }
            debug!("scripted feed script exhausted");
        });

        Ok(subscription)
    }
}

/// Feed whose subscription always fails, for configuration-fault paths.
pub struct FailingFeed;

#[async_trait]
impl SampleFeed for FailingFeed {
    async fn subscribe(
        &self,
        _kinds: &[MetricKind],
        _sink: SampleSink,
    ) -> Result<FeedSubscription> {
        Err(anyhow::anyhow!("sample feed unavailable"))
    }
}
