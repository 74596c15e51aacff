//! In-memory [`AssignmentStore`].
//!
//! Sessions work on a private copy of the data and publish it on commit, so
//! rollback semantics match the Postgres store. Only one session is open at a
//! time. Faults can be queued per candidate to exercise conflict and failure
//! paths of the engine.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use roster_id::{CandidateId, EventId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::model::{CandidateRecord, EventRecord};
use super::session::{AssignmentSession, AssignmentStore, PersistOutcome, StoreError, StoreResult};

/// Failure to inject into the next `persist_assignment` for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Report the write as a duplicate.
    Duplicate,
    /// Report a retryable serialization conflict.
    Serialization,
    /// Fail the write outright.
    Fatal,
}

/// Table contents of the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    pub events: BTreeMap<EventId, EventRecord>,
    pub candidates: BTreeMap<CandidateId, CandidateRecord>,
    pub availability: HashMap<CandidateId, HashSet<Weekday>>,
    pub bans: HashSet<(CandidateId, NaiveDate)>,
    pub preferences: Vec<(CandidateId, CandidateId)>,
    pub assignments: Vec<(CandidateId, EventId)>,
    /// Return inactive candidates from `load_active_candidates` too.
    pub leak_inactive: bool,
    /// Make the incense diagnostic query fail.
    pub fail_incense_count: bool,
}

impl MemoryData {
    pub fn add_event(&mut self, name: &str, date: Option<NaiveDate>, required_headcount: i32) -> EventId {
        let event_id = EventId::new();
        self.events.insert(
            event_id,
            EventRecord {
                event_id,
                name: name.to_string(),
                date,
                required_headcount,
            },
        );
        event_id
    }

    pub fn add_candidate(&mut self, record: CandidateRecord, weekdays: &[Weekday]) -> CandidateId {
        let candidate_id = record.candidate_id;
        self.availability
            .insert(candidate_id, weekdays.iter().copied().collect());
        self.candidates.insert(candidate_id, record);
        candidate_id
    }

    pub fn ban(&mut self, candidate_id: CandidateId, date: NaiveDate) {
        self.bans.insert((candidate_id, date));
    }

    pub fn prefer(&mut self, a: CandidateId, b: CandidateId) {
        self.preferences.push((a, b));
    }

    pub fn assign(&mut self, candidate_id: CandidateId, event_id: EventId) {
        self.assignments.push((candidate_id, event_id));
    }

    /// Records a past assignment on `date` through a dedicated history event.
    pub fn assign_on(&mut self, candidate_id: CandidateId, date: NaiveDate) {
        let event_id = self.add_event("history", Some(date), 1);
        self.assign(candidate_id, event_id);
    }

    pub fn assigned_to(&self, event_id: EventId) -> Vec<CandidateId> {
        self.assignments
            .iter()
            .filter(|(_, e)| *e == event_id)
            .map(|(c, _)| *c)
            .collect()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    data: MemoryData,
    faults: HashMap<CandidateId, VecDeque<Fault>>,
    commits: usize,
    rollbacks: usize,
}

/// Shared handle; clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new(data: MemoryData) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                data,
                ..Default::default()
            })),
        }
    }

    /// Queues a fault for the next write of `candidate_id`.
    pub async fn inject_fault(&self, candidate_id: CandidateId, fault: Fault) {
        self.state
            .lock()
            .await
            .faults
            .entry(candidate_id)
            .or_default()
            .push_back(fault);
    }

    /// Committed data.
    pub async fn snapshot(&self) -> MemoryData {
        self.state.lock().await.data.clone()
    }

    /// (commits, rollbacks) so far.
    pub async fn transaction_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.commits, state.rollbacks)
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> StoreResult<InMemorySession> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.data.clone();
        Ok(InMemorySession { guard, staged })
    }
}

/// Session over a private copy of the data.
pub struct InMemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryData,
}

impl InMemorySession {
    fn event_date(&self, event_id: &EventId) -> Option<NaiveDate> {
        self.staged.events.get(event_id).and_then(|e| e.date)
    }
}

#[async_trait]
impl AssignmentSession for InMemorySession {
    async fn load_event_for_update(&mut self, event_id: EventId) -> StoreResult<Option<EventRecord>> {
        Ok(self.staged.events.get(&event_id).cloned())
    }

    async fn load_active_candidates(&mut self) -> StoreResult<Vec<CandidateRecord>> {
        let leak = self.staged.leak_inactive;
        Ok(self
            .staged
            .candidates
            .values()
            .filter(|c| c.active || leak)
            .cloned()
            .collect())
    }

    async fn load_availability(
        &mut self,
        candidate_ids: &[CandidateId],
    ) -> StoreResult<HashMap<CandidateId, HashSet<Weekday>>> {
        Ok(candidate_ids
            .iter()
            .filter_map(|id| self.staged.availability.get(id).map(|days| (*id, days.clone())))
            .collect())
    }

    async fn load_bans(&mut self, date: NaiveDate) -> StoreResult<HashSet<CandidateId>> {
        Ok(self
            .staged
            .bans
            .iter()
            .filter(|(_, d)| *d == date)
            .map(|(c, _)| *c)
            .collect())
    }

    async fn load_most_recent_assignment_dates(
        &mut self,
        candidate_ids: &[CandidateId],
    ) -> StoreResult<HashMap<CandidateId, NaiveDate>> {
        let wanted: HashSet<_> = candidate_ids.iter().collect();
        let mut latest: HashMap<CandidateId, NaiveDate> = HashMap::new();

        for (candidate_id, event_id) in &self.staged.assignments {
            if !wanted.contains(candidate_id) {
                continue;
            }
            let Some(date) = self.event_date(event_id) else {
                continue;
            };
            latest
                .entry(*candidate_id)
                .and_modify(|d| *d = (*d).max(date))
                .or_insert(date);
        }

        Ok(latest)
    }

    async fn load_preference_edges(&mut self) -> StoreResult<Vec<(CandidateId, CandidateId)>> {
        Ok(self.staged.preferences.clone())
    }

    async fn count_existing_assignments(&mut self, event_id: EventId) -> StoreResult<usize> {
        Ok(self.staged.assigned_to(event_id).len())
    }

    async fn load_existing_assigned_candidates(
        &mut self,
        event_id: EventId,
    ) -> StoreResult<HashSet<CandidateId>> {
        Ok(self.staged.assigned_to(event_id).into_iter().collect())
    }

    async fn persist_assignment(
        &mut self,
        candidate_id: CandidateId,
        event_id: EventId,
    ) -> StoreResult<PersistOutcome> {
        let fault = self
            .guard
            .faults
            .get_mut(&candidate_id)
            .and_then(VecDeque::pop_front);

        match fault {
            Some(Fault::Duplicate) => return Ok(PersistOutcome::DuplicateConflict),
            Some(Fault::Serialization) => {
                return Err(StoreError::SerializationConflict(format!(
                    "injected conflict writing {candidate_id}"
                )))
            }
            Some(Fault::Fatal) => {
                return Err(StoreError::Backend(format!(
                    "injected failure writing {candidate_id}"
                )))
            }
            None => {}
        }

        if self.staged.assignments.contains(&(candidate_id, event_id)) {
            return Ok(PersistOutcome::DuplicateConflict);
        }
        self.staged.assign(candidate_id, event_id);
        Ok(PersistOutcome::Committed)
    }

    async fn count_incense_qualified_assigned(&mut self, event_id: EventId) -> StoreResult<usize> {
        if self.staged.fail_incense_count {
            return Err(StoreError::Backend("incense count unavailable".to_string()));
        }
        Ok(self
            .staged
            .assigned_to(event_id)
            .iter()
            .filter(|c| {
                self.staged
                    .candidates
                    .get(*c)
                    .is_some_and(|r| r.incense_qualified)
            })
            .count())
    }

    async fn commit(self) -> StoreResult<()> {
        let Self { mut guard, staged } = self;
        guard.data = staged;
        guard.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        let mut guard = self.guard;
        guard.rollbacks += 1;
        Ok(())
    }
}
