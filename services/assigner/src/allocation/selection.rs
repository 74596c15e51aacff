//! Greedy selection loop.
//!
//! ```text
//! Scanning ──best pick──▶ Committing ──committed, below target──▶ Scanning
//!    │                        │        ──committed, at target───▶ Done
//!    │                        └─────── duplicate conflict ──────▶ Scanning (candidate excluded)
//!    └── no positive score ─────────────────────────────────────▶ Exhausted
//! ```
//!
//! Selection and exclusion sets are disjoint and only grow during a run, so
//! every candidate is considered until it is selected or excluded, and never
//! again after that.

use std::collections::{BTreeSet, HashSet};

use roster_id::{CandidateId, EventId};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::model::Candidate;
use super::score::Scorer;
use super::session::{AssignmentSession, PersistOutcome, StoreResult};

/// Candidates assigned to the event, whether before or during this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet(BTreeSet<CandidateId>);

impl SelectionSet {
    pub fn contains(&self, candidate_id: &CandidateId) -> bool {
        self.0.contains(candidate_id)
    }

    /// Returns false if already present.
    pub fn insert(&mut self, candidate_id: CandidateId) -> bool {
        self.0.insert(candidate_id)
    }
}

impl FromIterator<CandidateId> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = CandidateId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Candidates that may not be picked for the rest of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet(BTreeSet<CandidateId>);

impl ExclusionSet {
    pub fn contains(&self, candidate_id: &CandidateId) -> bool {
        self.0.contains(candidate_id)
    }

    pub fn insert(&mut self, candidate_id: CandidateId) -> bool {
        self.0.insert(candidate_id)
    }
}

/// How a run ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Pre-existing assignments already met the headcount; nothing was scanned.
    AlreadyStaffed,
    /// The headcount was reached.
    Done,
    /// No positive-scoring candidate was left before reaching the headcount.
    Exhausted,
}

/// A committed pick and the score it won with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pick {
    pub candidate_id: CandidateId,
    pub score: f64,
}

/// What the loop did.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionReport {
    pub termination: Termination,
    pub picks: Vec<Pick>,
    pub conflicts: Vec<CandidateId>,
    pub selection: SelectionSet,
}

#[derive(Debug)]
enum LoopState {
    Scanning,
    Committing(Pick),
    Finished(Termination),
}

/// One run of the greedy loop over a fixed candidate roster.
pub struct SelectionLoop<'a> {
    event_id: EventId,
    candidates: Vec<&'a Candidate>,
    scorer: Scorer<'a>,
    selection: SelectionSet,
    exclusions: ExclusionSet,
    target: usize,
    picks: Vec<Pick>,
    conflicts: Vec<CandidateId>,
}

impl<'a> SelectionLoop<'a> {
    /// `seed` holds candidates already assigned to the event; they count as
    /// selected but are never re-scored. `ineligible` comes from the
    /// eligibility filter. `target` is the number of new assignments wanted.
    pub fn new(
        event_id: EventId,
        candidates: &'a [Candidate],
        scorer: Scorer<'a>,
        seed: SelectionSet,
        ineligible: &HashSet<CandidateId>,
        target: usize,
    ) -> Self {
        // Iteration order is ascending candidate id; ties go to the lowest id.
        let mut candidates: Vec<&Candidate> = candidates.iter().collect();
        candidates.sort_by_key(|c| c.candidate_id);
        candidates.dedup_by_key(|c| c.candidate_id);

        let mut exclusions = ExclusionSet::default();
        for candidate_id in ineligible {
            if !seed.contains(candidate_id) {
                exclusions.insert(*candidate_id);
            }
        }

        Self {
            event_id,
            candidates,
            scorer,
            selection: seed,
            exclusions,
            target,
            picks: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Best open candidate with a strictly positive score, if any.
    pub fn scan(&self) -> Option<Pick> {
        let mut best: Option<Pick> = None;

        for candidate in &self.candidates {
            let candidate_id = candidate.candidate_id;
            if self.exclusions.contains(&candidate_id) || self.selection.contains(&candidate_id) {
                continue;
            }

            let score = self.scorer.score(candidate, &self.selection, &self.exclusions);
            trace!(
                candidate_id = %candidate_id,
                breakdown = ?self.scorer.breakdown(candidate, &self.selection),
                "Score terms"
            );
            debug!(candidate_id = %candidate_id, score, "Scored candidate");

            if score > 0.0 && best.is_none_or(|b| score > b.score) {
                best = Some(Pick {
                    candidate_id,
                    score,
                });
            }
        }

        best
    }

    /// Drives the state machine until Done or Exhausted.
    ///
    /// Each winning pick is written through `session` immediately. Duplicate
    /// conflicts exclude the candidate and do not count toward the target;
    /// any other write failure is returned and ends the run.
    pub async fn run<S: AssignmentSession>(mut self, session: &mut S) -> StoreResult<SelectionReport> {
        let mut state = if self.target == 0 {
            LoopState::Finished(Termination::Done)
        } else {
            LoopState::Scanning
        };

        let termination = loop {
            state = match state {
                LoopState::Scanning => match self.scan() {
                    Some(pick) => LoopState::Committing(pick),
                    None => {
                        info!(
                            assigned = self.picks.len(),
                            needed = self.target,
                            "No more eligible candidates to assign"
                        );
                        LoopState::Finished(Termination::Exhausted)
                    }
                },
                LoopState::Committing(pick) => {
                    match session
                        .persist_assignment(pick.candidate_id, self.event_id)
                        .await?
                    {
                        PersistOutcome::Committed => {
                            self.selection.insert(pick.candidate_id);
                            self.picks.push(pick);
                            info!(
                                candidate_id = %pick.candidate_id,
                                event_id = %self.event_id,
                                score = pick.score,
                                "Assigned candidate"
                            );
                            if self.picks.len() >= self.target {
                                LoopState::Finished(Termination::Done)
                            } else {
                                LoopState::Scanning
                            }
                        }
                        PersistOutcome::DuplicateConflict => {
                            warn!(
                                candidate_id = %pick.candidate_id,
                                event_id = %self.event_id,
                                "Candidate already assigned concurrently; excluding for this run"
                            );
                            self.exclusions.insert(pick.candidate_id);
                            self.conflicts.push(pick.candidate_id);
                            LoopState::Scanning
                        }
                    }
                }
                LoopState::Finished(termination) => break termination,
            };
        };

        Ok(SelectionReport {
            termination,
            picks: self.picks,
            conflicts: self.conflicts,
            selection: self.selection,
        })
    }
}
