//! Transactional boundary around one assignment run.
//!
//! Load, eligibility, selection and every write happen inside a single
//! session. The run either commits as a whole or rolls back as a whole;
//! assignments from earlier successful runs are never touched.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use roster_id::{CandidateId, EventId, RunId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Span};

use super::eligibility::EligibilityFilter;
use super::model::{Candidate, Event, EventRecord};
use super::preferences::PreferenceGraph;
use super::score::{ScoreWeights, Scorer};
use super::selection::{Pick, SelectionLoop, SelectionSet, Termination};
use super::session::{AssignmentSession, AssignmentStore};
use super::{AllocationError, AllocationResult};

/// Below this many incense-qualified assignees a large event gets a warning.
const PREFERRED_INCENSE_COUNT: usize = 2;

/// Whether a run's writes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Commit,
    /// Run everything, then roll back.
    DryRun,
}

/// Retries for runs that lose a serialization race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Multiplied by the attempt number between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentOutcome {
    pub run_id: RunId,
    pub event_id: EventId,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub required_headcount: usize,
    /// Assignments that existed before the run.
    pub preexisting: usize,
    pub termination: Termination,
    /// New assignments, in pick order.
    pub picks: Vec<Pick>,
    /// Candidates skipped because they were assigned concurrently.
    pub conflicts: Vec<CandidateId>,
    /// `None` if the diagnostic query failed.
    pub incense_assigned: Option<usize>,
    /// False for dry runs.
    pub committed: bool,
}

impl AssignmentOutcome {
    pub fn assigned_total(&self) -> usize {
        self.preexisting + self.picks.len()
    }

    /// Seats still open after the run.
    pub fn shortfall(&self) -> usize {
        self.required_headcount.saturating_sub(self.assigned_total())
    }
}

/// The assignment engine.
pub struct Assigner<S> {
    store: S,
    weights: ScoreWeights,
}

impl<S: AssignmentStore> Assigner<S> {
    pub fn new(store: S, weights: ScoreWeights) -> Self {
        Self { store, weights }
    }

    /// Fills the event up to its required headcount and commits.
    ///
    /// Safe to call again on a fully staffed event: it commits an empty run.
    pub async fn assign_candidates_to_event(
        &self,
        event_id: EventId,
    ) -> AllocationResult<AssignmentOutcome> {
        self.run(event_id, RunMode::Commit).await
    }

    /// Like [`Self::run`], retrying from scratch while the failure is a
    /// serialization conflict and attempts remain.
    pub async fn run_with_retry(
        &self,
        event_id: EventId,
        mode: RunMode,
        policy: RetryPolicy,
    ) -> AllocationResult<AssignmentOutcome> {
        let mut attempt = 1;
        loop {
            match self.run(event_id, mode).await {
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        event_id = %event_id,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Assignment run conflicted with a concurrent run; retrying"
                    );
                    tokio::time::sleep(policy.backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Runs one assignment inside one session.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, event_id: EventId, mode: RunMode) -> AllocationResult<AssignmentOutcome> {
        let run_id = RunId::new();
        Span::current().record("run_id", tracing::field::display(run_id));

        let mut session = self.store.begin().await.map_err(AllocationError::Load)?;

        match self.run_in_session(&mut session, run_id, event_id).await {
            Ok(mut outcome) => {
                match mode {
                    RunMode::Commit => {
                        session.commit().await.map_err(AllocationError::Commit)?;
                        outcome.committed = true;
                        info!(
                            event_id = %event_id,
                            assigned = outcome.picks.len(),
                            termination = ?outcome.termination,
                            "Assignment complete"
                        );
                    }
                    RunMode::DryRun => {
                        if let Err(e) = session.rollback().await {
                            warn!(error = %e, "Rollback after dry run failed");
                        }
                        info!(
                            event_id = %event_id,
                            would_assign = outcome.picks.len(),
                            "Dry run complete; changes discarded"
                        );
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "Assignment run failed; rolling back");
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run_in_session(
        &self,
        session: &mut S::Session,
        run_id: RunId,
        event_id: EventId,
    ) -> AllocationResult<AssignmentOutcome> {
        let record = session
            .load_event_for_update(event_id)
            .await
            .map_err(AllocationError::Load)?
            .ok_or(AllocationError::EventNotFound(event_id))?;
        let event = validate_event(record)?;
        info!(
            event_id = %event.event_id,
            name = %event.name,
            date = %event.date,
            required_headcount = event.required_headcount,
            "Event loaded"
        );

        let preexisting = session
            .count_existing_assignments(event_id)
            .await
            .map_err(AllocationError::Load)?;

        let mut outcome = AssignmentOutcome {
            run_id,
            event_id,
            event_name: event.name.clone(),
            event_date: event.date,
            required_headcount: event.required_headcount,
            preexisting,
            termination: Termination::AlreadyStaffed,
            picks: Vec::new(),
            conflicts: Vec::new(),
            incense_assigned: None,
            committed: false,
        };

        if preexisting >= event.required_headcount {
            info!(
                assigned = preexisting,
                required = event.required_headcount,
                "Event already fully staffed; nothing to do"
            );
            return Ok(outcome);
        }

        let candidates = load_candidates(session, &event).await?;
        let graph = PreferenceGraph::from_edges(
            session
                .load_preference_edges()
                .await
                .map_err(AllocationError::Load)?,
        );
        debug!(edges = graph.edge_count(), "Preferences loaded");

        let bans = session
            .load_bans(event.date)
            .await
            .map_err(AllocationError::Load)?;
        let (ineligible, summary) = EligibilityFilter::new(event.date, &bans).partition(&candidates);
        info!(
            eligible = summary.eligible,
            inactive = summary.inactive,
            unavailable = summary.unavailable,
            banned = summary.banned,
            "Eligibility evaluated"
        );

        let seed: SelectionSet = session
            .load_existing_assigned_candidates(event_id)
            .await
            .map_err(AllocationError::Load)?
            .into_iter()
            .collect();

        let target = event.required_headcount - preexisting;
        info!(
            to_assign = target,
            required = event.required_headcount,
            preexisting,
            "Need to assign more candidates"
        );

        let scorer = Scorer::new(&self.weights, &graph, event.date, event.required_headcount);
        let report = SelectionLoop::new(event_id, &candidates, scorer, seed, &ineligible, target)
            .run(session)
            .await
            .map_err(AllocationError::PersistenceFatal)?;

        outcome.termination = report.termination;
        outcome.picks = report.picks;
        outcome.conflicts = report.conflicts;
        outcome.incense_assigned = self.check_incense(session, &event).await;

        Ok(outcome)
    }

    /// Diagnostic only: logs, never fails the run.
    async fn check_incense(&self, session: &mut S::Session, event: &Event) -> Option<usize> {
        match session.count_incense_qualified_assigned(event.event_id).await {
            Ok(count) => {
                if event.required_headcount >= self.weights.incense_threshold
                    && count < PREFERRED_INCENSE_COUNT
                {
                    warn!(
                        event_id = %event.event_id,
                        incense_assigned = count,
                        preferred = PREFERRED_INCENSE_COUNT,
                        "Large event has few incense-qualified candidates assigned"
                    );
                }
                Some(count)
            }
            Err(e) => {
                warn!(error = %e, "Could not count incense-qualified assignments");
                None
            }
        }
    }
}

fn validate_event(record: EventRecord) -> AllocationResult<Event> {
    let Some(date) = record.date else {
        return Err(AllocationError::InvalidEventState {
            event_id: record.event_id,
            reason: "no date set".to_string(),
        });
    };
    let required_headcount =
        usize::try_from(record.required_headcount).map_err(|_| AllocationError::InvalidEventState {
            event_id: record.event_id,
            reason: format!("negative required headcount {}", record.required_headcount),
        })?;

    Ok(Event {
        event_id: record.event_id,
        name: record.name,
        date,
        required_headcount,
    })
}

/// Loads the active roster with availability and last assignment dates.
async fn load_candidates<T: AssignmentSession>(
    session: &mut T,
    event: &Event,
) -> AllocationResult<Vec<Candidate>> {
    let records = session
        .load_active_candidates()
        .await
        .map_err(AllocationError::Load)?;
    if records.is_empty() {
        return Err(AllocationError::NoCandidatesAvailable);
    }
    info!(count = records.len(), "Active candidates loaded");

    let ids: Vec<CandidateId> = records.iter().map(|r| r.candidate_id).collect();
    let mut availability = session
        .load_availability(&ids)
        .await
        .map_err(AllocationError::Load)?;
    let last_assigned: HashMap<CandidateId, NaiveDate> = session
        .load_most_recent_assignment_dates(&ids)
        .await
        .map_err(AllocationError::Load)?;
    debug!(
        with_history = last_assigned.len(),
        event_date = %event.date,
        "Assignment history loaded"
    );

    Ok(records
        .into_iter()
        .map(|record| {
            let id = record.candidate_id;
            Candidate::from_record(
                record,
                availability.remove(&id).unwrap_or_default(),
                last_assigned.get(&id).copied(),
            )
        })
        .collect())
}
