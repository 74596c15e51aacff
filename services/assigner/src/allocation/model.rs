//! Domain types for a single assignment run.

use std::collections::HashSet;

use chrono::{NaiveDate, Weekday};
use roster_id::{CandidateId, EventId};

/// An event row as loaded from the store, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: EventId,
    pub name: String,
    /// `None` when the event has not been scheduled yet.
    pub date: Option<NaiveDate>,
    pub required_headcount: i32,
}

/// A validated event: it has a date and a non-negative headcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_id: EventId,
    pub name: String,
    pub date: NaiveDate,
    pub required_headcount: usize,
}

/// A candidate row as loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub candidate_id: CandidateId,
    pub display_name: String,
    pub active: bool,
    pub incense_qualified: bool,
}

/// A candidate with the per-run state needed for eligibility and scoring.
///
/// Built once per run and never written back; the only thing persisted is
/// whether the candidate ends up assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub display_name: String,
    pub active: bool,
    pub incense_qualified: bool,
    pub availability: HashSet<Weekday>,
    /// `None` means never assigned.
    pub last_assigned: Option<NaiveDate>,
}

impl Candidate {
    /// Combines a loaded row with its availability and assignment history.
    pub fn from_record(
        record: CandidateRecord,
        availability: HashSet<Weekday>,
        last_assigned: Option<NaiveDate>,
    ) -> Self {
        Self {
            candidate_id: record.candidate_id,
            display_name: record.display_name,
            active: record.active,
            incense_qualified: record.incense_qualified,
            availability,
            last_assigned,
        }
    }

    pub fn is_available_on(&self, weekday: Weekday) -> bool {
        self.availability.contains(&weekday)
    }
}
