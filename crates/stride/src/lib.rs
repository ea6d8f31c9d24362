//! Stride: workout session engine
//!
//! Tracks a single real-time exercise session: a lifecycle state machine
//! (idle → authorizing → active → ended), a wall-clock elapsed-time
//! clock that ticks independently of sample arrival, and aggregation of
//! raw heart-rate / energy / distance samples into one derived snapshot
//! with pace.
//!
//! The engine is a single spawned task; every mutation (command, clock
//! tick, feed sample, authorization result) funnels through one event
//! queue, and observers receive complete snapshot copies over a
//! broadcast channel. The platform collaborators (authorization dialog,
//! sensor feed) sit behind traits in [`feed`]; simulated implementations
//! live in [`sim`].

pub mod aggregator;
pub mod clock;
pub mod error;
pub mod feed;
pub mod session;
pub mod sim;
pub mod types;

pub use aggregator::SampleAggregator;
pub use clock::{ElapsedClock, TickDriver};
pub use error::SessionError;
pub use feed::{AuthorizationService, FeedSubscription, SampleFeed, SampleSink};
pub use session::{spawn_session, Session, SessionHandle, SessionUpdate};
pub use types::{
    round_decimals, round_whole, MetricKind, MetricSnapshot, MetricUnit, RawSample, SessionId,
    SessionState,
};
