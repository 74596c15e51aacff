//! Data-access contract consumed by the engine.
//!
//! A session is scoped to one assignment run and wraps one serializable
//! transaction. Everything the engine reads or writes goes through it, and
//! nothing it does is visible to other runs until [`AssignmentSession::commit`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use roster_id::{CandidateId, EventId};

use super::model::{CandidateRecord, EventRecord};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Data-access failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another transaction touched the same rows; the whole run may be retried.
    #[error("serialization conflict: {0}")]
    SerializationConflict(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Failure from a non-database backend.
    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SerializationConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            // serialization_failure, deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
                return Self::SerializationConflict(db_err.message().to_string());
            }
        }
        Self::Database(err)
    }
}

/// Result of writing one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Committed,
    /// The candidate is already assigned to this event through another path.
    DuplicateConflict,
}

/// Opens run-scoped sessions.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    type Session: AssignmentSession;

    /// Begins a serializable session.
    async fn begin(&self) -> StoreResult<Self::Session>;
}

/// The reads and writes of one assignment run.
#[async_trait]
pub trait AssignmentSession: Send {
    /// Loads the event and locks it against concurrent runs until the session
    /// ends. `Ok(None)` if it does not exist.
    async fn load_event_for_update(&mut self, event_id: EventId) -> StoreResult<Option<EventRecord>>;

    async fn load_active_candidates(&mut self) -> StoreResult<Vec<CandidateRecord>>;

    /// Normalized availability per candidate. Candidates without any recorded
    /// weekday may be missing from the map.
    async fn load_availability(
        &mut self,
        candidate_ids: &[CandidateId],
    ) -> StoreResult<HashMap<CandidateId, HashSet<Weekday>>>;

    /// Candidates banned on exactly `date`.
    async fn load_bans(&mut self, date: NaiveDate) -> StoreResult<HashSet<CandidateId>>;

    /// Date of each candidate's most recent assignment. Never-assigned
    /// candidates are missing from the map.
    async fn load_most_recent_assignment_dates(
        &mut self,
        candidate_ids: &[CandidateId],
    ) -> StoreResult<HashMap<CandidateId, NaiveDate>>;

    /// Preference pairs, each stored once in either orientation.
    async fn load_preference_edges(&mut self) -> StoreResult<Vec<(CandidateId, CandidateId)>>;

    async fn count_existing_assignments(&mut self, event_id: EventId) -> StoreResult<usize>;

    async fn load_existing_assigned_candidates(
        &mut self,
        event_id: EventId,
    ) -> StoreResult<HashSet<CandidateId>>;

    /// Writes one assignment. A duplicate is reported as
    /// [`PersistOutcome::DuplicateConflict`] and leaves the session usable.
    async fn persist_assignment(
        &mut self,
        candidate_id: CandidateId,
        event_id: EventId,
    ) -> StoreResult<PersistOutcome>;

    /// Diagnostic only.
    async fn count_incense_qualified_assigned(&mut self, event_id: EventId) -> StoreResult<usize>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
