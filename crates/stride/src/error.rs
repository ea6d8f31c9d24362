//! Session error taxonomy.
//!
//! Every variant is non-fatal: failures from collaborators are caught at
//! the engine boundary and surfaced to observers as signals. An undefined
//! pace is not an error at all; it is the `None` case of
//! [`MetricSnapshot::pace`](crate::types::MetricSnapshot).

use thiserror::Error;

/// Errors surfaced by the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The authorization collaborator denied access. The session stays
    /// idle; the caller may authorize again.
    #[error("authorization denied by the metrics provider")]
    AuthorizationDenied,

    /// `start` was invoked before access was granted.
    #[error("authorization required before starting a session")]
    AuthorizationRequired,

    /// Feed or clock setup failed; the session keeps its prior state.
    #[error("session configuration failed: {0}")]
    ConfigurationFailed(String),

    /// The engine task is gone; the handle can no longer be used.
    #[error("session engine shut down")]
    Shutdown,
}
