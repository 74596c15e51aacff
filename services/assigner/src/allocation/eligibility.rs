//! Eligibility filter.
//!
//! Hard pass/fail gate evaluated once per candidate before selection starts.
//! A candidate is excluded when inactive, unavailable on the event weekday,
//! or banned on the exact event date. Being already selected is not an
//! exclusion; that is tracked by the selection set.

use std::collections::HashSet;

use chrono::{NaiveDate, Weekday};
use roster_id::CandidateId;

use super::model::Candidate;
use super::weekday;

/// Outcome of the eligibility check for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Inactive,
    Unavailable,
    Banned,
}

impl Verdict {
    pub fn is_excluded(&self) -> bool {
        !matches!(self, Self::Eligible)
    }
}

/// Exclusion counts by reason, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionSummary {
    pub eligible: usize,
    pub inactive: usize,
    pub unavailable: usize,
    pub banned: usize,
}

impl ExclusionSummary {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Eligible => self.eligible += 1,
            Verdict::Inactive => self.inactive += 1,
            Verdict::Unavailable => self.unavailable += 1,
            Verdict::Banned => self.banned += 1,
        }
    }
}

/// Eligibility filter bound to one event date.
#[derive(Debug)]
pub struct EligibilityFilter<'a> {
    event_weekday: Weekday,
    bans: &'a HashSet<CandidateId>,
}

impl<'a> EligibilityFilter<'a> {
    /// `bans` must be the ban list for `event_date` exactly.
    pub fn new(event_date: NaiveDate, bans: &'a HashSet<CandidateId>) -> Self {
        Self {
            event_weekday: weekday::of_date(event_date),
            bans,
        }
    }

    /// Evaluates a single candidate. Inactive is checked first even though
    /// the loader only returns active candidates.
    pub fn evaluate(&self, candidate: &Candidate) -> Verdict {
        if !candidate.active {
            return Verdict::Inactive;
        }
        if !candidate.is_available_on(self.event_weekday) {
            return Verdict::Unavailable;
        }
        if self.bans.contains(&candidate.candidate_id) {
            return Verdict::Banned;
        }
        Verdict::Eligible
    }

    /// Returns the ids of all excluded candidates plus a per-reason summary.
    pub fn partition(&self, candidates: &[Candidate]) -> (HashSet<CandidateId>, ExclusionSummary) {
        let mut excluded = HashSet::new();
        let mut summary = ExclusionSummary::default();

        for candidate in candidates {
            let verdict = self.evaluate(candidate);
            summary.record(verdict);
            if verdict.is_excluded() {
                excluded.insert(candidate.candidate_id);
            }
        }

        (excluded, summary)
    }
}
