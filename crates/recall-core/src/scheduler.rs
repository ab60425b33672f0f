//! # Scheduler Module
//!
//! The SM-2-family grading function at the heart of Recall.
//!
//! ## The Grade Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HOW ONE GRADE TRANSFORMS THE SCHEDULING STATE                          │
//! │                                                                         │
//! │  Grade  │ repetitions │ interval                 │ EF        │ state    │
//! │  ───────┼─────────────┼──────────────────────────┼───────────┼───────── │
//! │  Again  │ reset to 0  │ 1                        │ EF - 0.2  │ RELEARN  │
//! │  Hard   │ +1          │ max(1, ceil(i × 1.2))    │ EF - 0.15 │ REVIEW   │
//! │  Good   │ +1          │ i == 0 ? 1 : ceil(i×EF)  │ unchanged │ REVIEW   │
//! │  Easy   │ +1          │ i == 0 ? 2 : ceil(i×EF×1.3) │ EF + 0.15 │ REVIEW│
//! │                                                                         │
//! │  EF is floored at 1.3 after every adjustment.                          │
//! │  next_review_at = now + interval days.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Ceiling?
//! Interval growth rounds UP, never down. A successful review always earns
//! at least one full day of progress, so low ease factors cannot stall a
//! card at the same interval forever.
//!
//! ## Usage
//! ```rust
//! use recall_core::scheduler::apply_grade;
//! use recall_core::types::{Grade, Scheduling};
//! use chrono::Utc;
//!
//! let fresh = Scheduling::fresh();
//! let next = apply_grade(&fresh, Grade::Good, Utc::now());
//! assert_eq!(next.interval_days, 1);
//! assert_eq!(next.repetitions, 1);
//! ```

use chrono::{DateTime, Utc};

use crate::types::{
    next_review_date, Grade, LearningState, Scheduling, MIN_EASE_FACTOR, MIN_INTERVAL_DAYS,
};

// =============================================================================
// Grading
// =============================================================================

/// Applies one grade to a scheduling snapshot and returns the new snapshot.
///
/// Pure and total: the same inputs always yield the same output, no grade
/// ever fails, and no I/O happens here. Persistence, review logging and
/// sync flagging are the caller's concern.
///
/// ## Guarantees
/// - `ease_factor >= 1.3` in every output
/// - `interval_days >= 1` in every output
/// - `Again` resets `repetitions` to 0 and yields RELEARNING regardless of
///   the prior state
/// - successful grades yield REVIEWING
pub fn apply_grade(current: &Scheduling, grade: Grade, now: DateTime<Utc>) -> Scheduling {
    let next = match grade {
        Grade::Again => Scheduling {
            learning_state: LearningState::Relearning,
            interval_days: MIN_INTERVAL_DAYS,
            ease_factor: floor_ease(current.ease_factor - 0.2),
            repetitions: 0,
            next_review_at: None,
        },
        Grade::Hard => Scheduling {
            learning_state: LearningState::Reviewing,
            // i × 1.2 in exact integer math (× 6/5, rounded up) so the
            // ceiling is applied to the true product, not a float artifact
            interval_days: ((current.interval_days * 6 + 4) / 5).max(MIN_INTERVAL_DAYS),
            ease_factor: floor_ease(current.ease_factor - 0.15),
            repetitions: current.repetitions + 1,
            next_review_at: None,
        },
        Grade::Good => Scheduling {
            learning_state: LearningState::Reviewing,
            interval_days: if current.interval_days == 0 {
                MIN_INTERVAL_DAYS
            } else {
                ceil_days(current.interval_days as f64 * current.ease_factor)
            },
            ease_factor: current.ease_factor,
            repetitions: current.repetitions + 1,
            next_review_at: None,
        },
        Grade::Easy => Scheduling {
            learning_state: LearningState::Reviewing,
            interval_days: if current.interval_days == 0 {
                2 * MIN_INTERVAL_DAYS
            } else {
                ceil_days(current.interval_days as f64 * current.ease_factor * 1.3)
            },
            ease_factor: current.ease_factor + 0.15,
            repetitions: current.repetitions + 1,
            next_review_at: None,
        },
    };

    Scheduling {
        next_review_at: Some(next_review_date(now, next.interval_days)),
        ..next
    }
}

/// Floors an ease factor at the SM-2 minimum.
fn floor_ease(ef: f64) -> f64 {
    ef.max(MIN_EASE_FACTOR)
}

/// Rounds a fractional day count up to a whole number of days.
fn ceil_days(days: f64) -> i64 {
    (days.ceil() as i64).max(MIN_INTERVAL_DAYS)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_EASE_FACTOR;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn reviewing(interval_days: i64, ease_factor: f64, repetitions: i64) -> Scheduling {
        Scheduling {
            learning_state: LearningState::Reviewing,
            interval_days,
            ease_factor,
            repetitions,
            next_review_at: None,
        }
    }

    /// Scenario: interval=0, EF=2.5, Good -> interval=1, EF=2.5, reps=1.
    #[test]
    fn test_first_good_review() {
        let now = t("2026-03-01T12:00:00Z");
        let next = apply_grade(&Scheduling::fresh(), Grade::Good, now);

        assert_eq!(next.interval_days, 1);
        assert_eq!(next.ease_factor, 2.5);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.learning_state, LearningState::Reviewing);
        assert_eq!(next.next_review_at, Some(t("2026-03-02T12:00:00Z")));
    }

    /// Scenario: interval=7, EF=2.5, Good -> interval=ceil(7×2.5)=18.
    #[test]
    fn test_good_grows_by_ease_factor() {
        let now = t("2026-03-01T12:00:00Z");
        let next = apply_grade(&reviewing(7, 2.5, 3), Grade::Good, now);

        assert_eq!(next.interval_days, 18);
        assert_eq!(next.ease_factor, 2.5);
        assert_eq!(next.repetitions, 4);
        assert_eq!(next.next_review_at, Some(t("2026-03-19T12:00:00Z")));
    }

    /// Scenario: interval=7, EF=2.5, Again -> interval=1, EF=2.3, reps=0.
    #[test]
    fn test_again_resets() {
        let now = t("2026-03-01T12:00:00Z");
        let next = apply_grade(&reviewing(7, 2.5, 3), Grade::Again, now);

        assert_eq!(next.interval_days, 1);
        assert!((next.ease_factor - 2.3).abs() < 1e-9);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.learning_state, LearningState::Relearning);
    }

    /// Scenario: interval=0, EF=2.5, Easy -> interval=2, EF=2.65.
    #[test]
    fn test_first_easy_review() {
        let now = t("2026-03-01T12:00:00Z");
        let next = apply_grade(&Scheduling::fresh(), Grade::Easy, now);

        assert_eq!(next.interval_days, 2);
        assert!((next.ease_factor - 2.65).abs() < 1e-9);
        assert_eq!(next.learning_state, LearningState::Reviewing);
    }

    #[test]
    fn test_easy_grows_with_bonus() {
        let now = t("2026-03-01T12:00:00Z");
        // ceil(10 × 2.5 × 1.3) = ceil(32.5) = 33
        let next = apply_grade(&reviewing(10, 2.5, 5), Grade::Easy, now);
        assert_eq!(next.interval_days, 33);
    }

    #[test]
    fn test_hard_shrinks_ease_and_grows_slowly() {
        let now = t("2026-03-01T12:00:00Z");
        // ceil(7 × 1.2) = ceil(8.4) = 9
        let next = apply_grade(&reviewing(7, 2.5, 3), Grade::Hard, now);
        assert_eq!(next.interval_days, 9);
        assert!((next.ease_factor - 2.35).abs() < 1e-9);
        assert_eq!(next.repetitions, 4);
    }

    #[test]
    fn test_hard_exact_multiples_do_not_overshoot() {
        let now = t("2026-03-01T12:00:00Z");
        // 5 × 1.2 = 6 exactly; the ceiling must not bump it to 7
        let next = apply_grade(&reviewing(5, 2.5, 2), Grade::Hard, now);
        assert_eq!(next.interval_days, 6);
    }

    /// interval=1: Hard gives ceil(1.2)=2 while Good gives ceil(EF)=3.
    /// The ordering anomaly is intentional behavior, kept as-is.
    #[test]
    fn test_hard_good_ordering_at_small_intervals() {
        let now = t("2026-03-01T12:00:00Z");
        let hard = apply_grade(&reviewing(1, 2.5, 1), Grade::Hard, now);
        let good = apply_grade(&reviewing(1, 2.5, 1), Grade::Good, now);
        assert_eq!(hard.interval_days, 2);
        assert_eq!(good.interval_days, 3);
    }

    #[test]
    fn test_again_resets_regardless_of_prior_state() {
        let now = t("2026-03-01T12:00:00Z");
        for state in [
            LearningState::New,
            LearningState::Learning,
            LearningState::Reviewing,
            LearningState::Relearning,
        ] {
            let current = Scheduling {
                learning_state: state,
                interval_days: 30,
                ease_factor: 2.1,
                repetitions: 9,
                next_review_at: None,
            };
            let next = apply_grade(&current, Grade::Again, now);
            assert_eq!(next.learning_state, LearningState::Relearning);
            assert_eq!(next.repetitions, 0);
            assert_eq!(next.interval_days, 1);
        }
    }

    #[test]
    fn test_ease_factor_never_below_minimum() {
        let now = t("2026-03-01T12:00:00Z");
        let mut sched = reviewing(5, MIN_EASE_FACTOR, 2);

        // Repeated failures must not push EF below the floor
        for _ in 0..10 {
            sched = apply_grade(&sched, Grade::Again, now);
            assert!(sched.ease_factor >= MIN_EASE_FACTOR);
            sched = apply_grade(&sched, Grade::Hard, now);
            assert!(sched.ease_factor >= MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn test_interval_always_at_least_one_day() {
        let now = t("2026-03-01T12:00:00Z");
        for grade in [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy] {
            let next = apply_grade(&Scheduling::fresh(), grade, now);
            assert!(
                next.interval_days >= 1,
                "{grade} produced interval {}",
                next.interval_days
            );
        }
    }

    #[test]
    fn test_minimum_ease_never_stalls_interval() {
        let now = t("2026-03-01T12:00:00Z");
        // With EF pinned at 1.3 the ceiling still guarantees growth
        let mut sched = reviewing(1, MIN_EASE_FACTOR, 1);
        for _ in 0..5 {
            let next = apply_grade(&sched, Grade::Good, now);
            assert!(next.interval_days > sched.interval_days);
            sched = next;
        }
    }

    #[test]
    fn test_apply_grade_is_pure() {
        let now = t("2026-03-01T12:00:00Z");
        let current = reviewing(7, DEFAULT_EASE_FACTOR, 3);

        let first = apply_grade(&current, Grade::Good, now);
        let second = apply_grade(&current, Grade::Good, now);

        assert_eq!(first, second);
        // Input is untouched
        assert_eq!(current.interval_days, 7);
        assert_eq!(current.repetitions, 3);
    }
}
