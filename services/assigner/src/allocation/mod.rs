//! Assignment engine.
//!
//! Picks volunteers for an event, one at a time, by highest score:
//! - `eligibility` removes candidates who cannot serve on the event date
//! - `score` ranks the rest by idle time, selected partners and incense
//! - `selection` runs the greedy loop and writes each pick immediately
//! - `engine` wraps a whole run in one serializable session
//!
//! Persistence is abstracted behind [`AssignmentStore`]; `db` provides the
//! Postgres implementation and [`memory`] an in-memory one.

mod eligibility;
mod engine;
pub mod memory;
mod model;
mod preferences;
mod score;
mod selection;
mod session;
pub mod weekday;

pub use eligibility::{EligibilityFilter, ExclusionSummary, Verdict};
pub use engine::{AssignmentOutcome, Assigner, RetryPolicy, RunMode};
pub use model::{Candidate, CandidateRecord, Event, EventRecord};
pub use preferences::PreferenceGraph;
pub use score::{idle_days, InvalidWeight, ScoreBreakdown, ScoreWeights, Scorer};
pub use selection::{
    ExclusionSet, Pick, SelectionLoop, SelectionReport, SelectionSet, Termination,
};
pub use session::{AssignmentSession, AssignmentStore, PersistOutcome, StoreError, StoreResult};

use roster_id::EventId;

/// Result type for assignment runs.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Reasons an assignment run fails. Every variant rolls back the run.
///
/// Running out of eligible candidates is not an error; see
/// [`Termination::Exhausted`].
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("event {event_id} cannot be staffed: {reason}")]
    InvalidEventState { event_id: EventId, reason: String },

    /// The active roster is empty.
    #[error("no active candidates in the system")]
    NoCandidatesAvailable,

    #[error("failed to load assignment state: {0}")]
    Load(#[source] StoreError),

    #[error("failed to persist assignment: {0}")]
    PersistenceFatal(#[source] StoreError),

    #[error("failed to commit assignment run: {0}")]
    Commit(#[source] StoreError),
}

impl AllocationError {
    /// True when the run lost a race with a concurrent run and can be retried
    /// from scratch.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Load(e) | Self::PersistenceFatal(e) | Self::Commit(e) => e.is_retryable(),
            _ => false,
        }
    }
}
