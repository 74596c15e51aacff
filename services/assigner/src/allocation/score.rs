//! Candidate scoring.
//!
//! The score of an eligible candidate is
//!
//! ```text
//! base
//!   + fairness_weight   * idle_days
//!   + preference_weight * (selected preferred partners)
//!   + incense_weight    (if headcount >= threshold and incense-qualified)
//! ```
//!
//! Excluded or inactive candidates always score exactly 0. Scores depend on
//! the live selection set and must be recomputed every iteration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::Candidate;
use super::preferences::PreferenceGraph;
use super::selection::{ExclusionSet, SelectionSet};

/// Tunable scoring constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Contribution of any eligible candidate.
    pub base: f64,
    /// Per whole day since the last assignment.
    pub fairness: f64,
    /// Per preferred partner already selected.
    pub preference: f64,
    /// Bonus for incense-qualified candidates on large events.
    pub incense: f64,
    /// Minimum required headcount for the incense bonus to apply.
    pub incense_threshold: usize,
    /// Idle days assumed for a candidate who was never assigned.
    pub never_assigned_days: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base: 1.0,
            fairness: 1.8,
            preference: 6.0,
            incense: 0.7,
            incense_threshold: 8,
            never_assigned_days: 3650,
        }
    }
}

/// A weight that would make scores meaningless.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid score weight {name}: {value}")]
pub struct InvalidWeight {
    pub name: &'static str,
    pub value: f64,
}

impl ScoreWeights {
    /// Checks that all weights are finite and non-negative, and that the base
    /// is strictly positive (otherwise eligible candidates could score 0).
    pub fn validate(&self) -> Result<(), InvalidWeight> {
        let checks = [
            ("base", self.base),
            ("fairness", self.fairness),
            ("preference", self.preference),
            ("incense", self.incense),
            ("never_assigned_days", self.never_assigned_days as f64),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidWeight { name, value });
            }
        }
        if self.base <= 0.0 {
            return Err(InvalidWeight {
                name: "base",
                value: self.base,
            });
        }
        Ok(())
    }
}

/// Individual score terms, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub idle_days: i64,
    pub fairness: f64,
    pub selected_partners: usize,
    pub preference: f64,
    pub incense: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base + self.fairness + self.preference + self.incense
    }
}

/// Whole days between the last assignment and the event date.
///
/// `None` maps to `never_assigned_days`. The distance is absolute: an
/// assignment 5 days after the event counts the same as one 5 days before.
pub fn idle_days(last_assigned: Option<NaiveDate>, event_date: NaiveDate, weights: &ScoreWeights) -> i64 {
    match last_assigned {
        None => weights.never_assigned_days,
        Some(last) => (event_date - last).num_days().abs(),
    }
}

/// Scores candidates for one event.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    weights: &'a ScoreWeights,
    preferences: &'a PreferenceGraph,
    event_date: NaiveDate,
    required_headcount: usize,
}

impl<'a> Scorer<'a> {
    pub fn new(
        weights: &'a ScoreWeights,
        preferences: &'a PreferenceGraph,
        event_date: NaiveDate,
        required_headcount: usize,
    ) -> Self {
        Self {
            weights,
            preferences,
            event_date,
            required_headcount,
        }
    }

    /// Score of `candidate` given the current selection.
    ///
    /// Exactly 0 when the candidate is excluded or inactive. Falls back to the
    /// base contribution if the sum is not finite.
    pub fn score(
        &self,
        candidate: &Candidate,
        selection: &SelectionSet,
        exclusions: &ExclusionSet,
    ) -> f64 {
        if exclusions.contains(&candidate.candidate_id) || !candidate.active {
            return 0.0;
        }

        let total = self.breakdown(candidate, selection).total();
        if total.is_finite() {
            total
        } else {
            self.weights.base
        }
    }

    /// Score terms of an eligible candidate. Does not look at exclusions.
    pub fn breakdown(&self, candidate: &Candidate, selection: &SelectionSet) -> ScoreBreakdown {
        let idle_days = idle_days(candidate.last_assigned, self.event_date, self.weights);

        let selected_partners = self
            .preferences
            .partners(&candidate.candidate_id)
            .filter(|partner| selection.contains(partner))
            .count();

        let incense = if self.required_headcount >= self.weights.incense_threshold
            && candidate.incense_qualified
        {
            self.weights.incense
        } else {
            0.0
        };

        ScoreBreakdown {
            base: self.weights.base,
            idle_days,
            fairness: self.weights.fairness * idle_days as f64,
            selected_partners,
            preference: self.weights.preference * selected_partners as f64,
            incense,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use chrono::{Days, Weekday};
    use proptest::prelude::*;
    use roster_id::CandidateId;
    use rstest::rstest;

    fn event_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn id(n: u128) -> CandidateId {
        CandidateId::from_parts(1, n)
    }

    fn candidate(n: u128, last_assigned: Option<NaiveDate>, incense: bool) -> Candidate {
        Candidate {
            candidate_id: id(n),
            display_name: format!("candidate {n}"),
            active: true,
            incense_qualified: incense,
            availability: HashSet::from([Weekday::Mon]),
            last_assigned,
        }
    }

    fn days_ago(days: u64) -> Option<NaiveDate> {
        event_date().checked_sub_days(Days::new(days))
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoreWeights::default().validate().is_ok());
    }

    #[rstest]
    #[case(ScoreWeights { base: 0.0, ..ScoreWeights::default() }, "base")]
    #[case(ScoreWeights { fairness: -1.0, ..ScoreWeights::default() }, "fairness")]
    #[case(ScoreWeights { preference: f64::NAN, ..ScoreWeights::default() }, "preference")]
    #[case(ScoreWeights { incense: f64::INFINITY, ..ScoreWeights::default() }, "incense")]
    #[case(ScoreWeights { never_assigned_days: -1, ..ScoreWeights::default() }, "never_assigned_days")]
    fn test_invalid_weights_rejected(#[case] weights: ScoreWeights, #[case] name: &str) {
        assert_eq!(weights.validate().unwrap_err().name, name);
    }

    #[test]
    fn test_score_terms() {
        let weights = ScoreWeights::default();
        let graph = PreferenceGraph::new();
        let scorer = Scorer::new(&weights, &graph, event_date(), 2);

        let c = candidate(1, days_ago(10), false);
        let score = scorer.score(&c, &SelectionSet::default(), &ExclusionSet::default());
        assert_eq!(score, 1.0 + 1.8 * 10.0);
    }

    #[test]
    fn test_never_assigned_uses_constant() {
        let weights = ScoreWeights::default();
        assert_eq!(idle_days(None, event_date(), &weights), 3650);
    }

    #[test]
    fn test_future_assignment_counts_distance() {
        let weights = ScoreWeights::default();
        let later = event_date().checked_add_days(Days::new(5));
        let earlier = event_date().checked_sub_days(Days::new(5));
        assert_eq!(idle_days(later, event_date(), &weights), 5);
        assert_eq!(idle_days(later, event_date(), &weights), idle_days(earlier, event_date(), &weights));
    }

    #[test]
    fn test_later_booking_outranks_yesterday() {
        let weights = ScoreWeights::default();
        let yesterday = event_date().checked_sub_days(Days::new(1));
        let next_month = event_date().checked_add_days(Days::new(30));
        assert!(idle_days(next_month, event_date(), &weights) > idle_days(yesterday, event_date(), &weights));
    }

    #[test]
    fn test_excluded_scores_zero() {
        let weights = ScoreWeights::default();
        let graph = PreferenceGraph::new();
        let scorer = Scorer::new(&weights, &graph, event_date(), 10);
        let c = candidate(1, None, true);

        let mut exclusions = ExclusionSet::default();
        exclusions.insert(c.candidate_id);

        assert_eq!(scorer.score(&c, &SelectionSet::default(), &exclusions), 0.0);
    }

    #[test]
    fn test_inactive_scores_zero() {
        let weights = ScoreWeights::default();
        let graph = PreferenceGraph::new();
        let scorer = Scorer::new(&weights, &graph, event_date(), 10);
        let mut c = candidate(1, None, true);
        c.active = false;

        assert_eq!(
            scorer.score(&c, &SelectionSet::default(), &ExclusionSet::default()),
            0.0
        );
    }

    #[test]
    fn test_non_finite_falls_back_to_base() {
        let weights = ScoreWeights {
            fairness: f64::MAX,
            preference: f64::MAX,
            ..ScoreWeights::default()
        };
        let graph = PreferenceGraph::from_edges([(id(1), id(2))]);
        let scorer = Scorer::new(&weights, &graph, event_date(), 2);

        let mut selection = SelectionSet::default();
        selection.insert(id(2));

        let c = candidate(1, None, false);
        assert_eq!(scorer.score(&c, &selection, &ExclusionSet::default()), weights.base);
    }

    #[rstest]
    #[case(7, true, 0.0)]
    #[case(8, true, 0.7)]
    #[case(12, true, 0.7)]
    #[case(8, false, 0.0)]
    fn test_incense_threshold(#[case] headcount: usize, #[case] qualified: bool, #[case] bonus: f64) {
        let weights = ScoreWeights::default();
        let graph = PreferenceGraph::new();
        let scorer = Scorer::new(&weights, &graph, event_date(), headcount);

        let c = candidate(1, days_ago(0), qualified);
        let breakdown = scorer.breakdown(&c, &SelectionSet::default());
        assert_eq!(breakdown.incense, bonus);
        assert_eq!(breakdown.total(), weights.base + bonus);
    }

    #[test]
    fn test_preference_bonus_only_for_selected_partners() {
        let weights = ScoreWeights::default();
        let graph = PreferenceGraph::from_edges([(id(1), id(2)), (id(1), id(3)), (id(1), id(4))]);
        let scorer = Scorer::new(&weights, &graph, event_date(), 4);
        let c = candidate(1, days_ago(1), false);

        let mut selection = SelectionSet::default();
        selection.insert(id(2));
        let one = scorer.breakdown(&c, &selection);
        assert_eq!(one.selected_partners, 1);

        selection.insert(id(3));
        selection.insert(id(9));
        let two = scorer.breakdown(&c, &selection);
        assert_eq!(two.selected_partners, 2);
        assert_eq!(two.preference, 2.0 * weights.preference);
        assert!(two.total() > one.total());
    }

    proptest! {
        #[test]
        fn excluded_is_always_zero(
            idle in proptest::option::of(0u64..20_000),
            incense in any::<bool>(),
            headcount in 0usize..32,
            partner_selected in any::<bool>(),
        ) {
            let weights = ScoreWeights::default();
            let graph = PreferenceGraph::from_edges([(id(1), id(2))]);
            let scorer = Scorer::new(&weights, &graph, event_date(), headcount);
            let c = candidate(1, idle.and_then(days_ago), incense);

            let mut selection = SelectionSet::default();
            if partner_selected {
                selection.insert(id(2));
            }
            let mut exclusions = ExclusionSet::default();
            exclusions.insert(id(1));

            prop_assert_eq!(scorer.score(&c, &selection, &exclusions), 0.0);
        }

        #[test]
        fn fairness_is_monotone_in_idle_days(a in 0u64..5000, b in 0u64..5000) {
            let weights = ScoreWeights::default();
            let graph = PreferenceGraph::new();
            let scorer = Scorer::new(&weights, &graph, event_date(), 2);
            let (short, long) = if a <= b { (a, b) } else { (b, a) };

            let recent = candidate(1, days_ago(short), false);
            let idle = candidate(2, days_ago(long), false);
            let none = SelectionSet::default();
            let exclusions = ExclusionSet::default();

            prop_assert!(scorer.score(&idle, &none, &exclusions) >= scorer.score(&recent, &none, &exclusions));
        }

        #[test]
        fn never_assigned_beats_yesterday(incense in any::<bool>()) {
            let weights = ScoreWeights::default();
            let graph = PreferenceGraph::new();
            let scorer = Scorer::new(&weights, &graph, event_date(), 2);
            let none = SelectionSet::default();

            let never = scorer.breakdown(&candidate(1, None, incense), &none);
            let yesterday = scorer.breakdown(&candidate(2, days_ago(1), incense), &none);
            prop_assert!(never.fairness >= yesterday.fairness);
        }
    }
}
