use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::AttendanceStats;

/// How far ahead of the scheduled start a self-service check-in opens.
pub const EARLY_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInDecision {
    Accepted,
    AlreadyCheckedIn,
    ClassEnded,
    TooEarly,
}

impl CheckInDecision {
    pub fn message(&self) -> &'static str {
        match self {
            CheckInDecision::Accepted => "Checked-in successfully",
            CheckInDecision::AlreadyCheckedIn => "You are already checked-in",
            CheckInDecision::ClassEnded => "This class has already ended",
            CheckInDecision::TooEarly => {
                "You can only check-in 15 minutes before the class starts"
            }
        }
    }
}

/// Combines the class date with its start and end times of day.
///
/// A class whose end time sorts before its start time (crossing midnight)
/// produces an end instant earlier than the start; that window is kept as-is
/// and such a class reads as already ended for most of its run.
pub fn class_window(
    date: NaiveDate,
    start_at: NaiveTime,
    end_at: NaiveTime,
) -> (NaiveDateTime, NaiveDateTime) {
    (date.and_time(start_at), date.and_time(end_at))
}

/// Decides a self-service check-in attempt. Exactly at the window boundary
/// (15 minutes before start) the attempt is allowed.
pub fn decide_check_in(
    date: NaiveDate,
    start_at: NaiveTime,
    end_at: NaiveTime,
    now: NaiveDateTime,
    already_checked_in: bool,
) -> CheckInDecision {
    let (class_start, class_end) = class_window(date, start_at, end_at);
    let earliest_allowed = class_start - Duration::minutes(EARLY_WINDOW_MINUTES);

    if already_checked_in {
        CheckInDecision::AlreadyCheckedIn
    } else if now > class_end {
        CheckInDecision::ClassEnded
    } else if now < earliest_allowed {
        CheckInDecision::TooEarly
    } else {
        CheckInDecision::Accepted
    }
}

/// Folds the insert outcome back into the decision: an accepted attempt
/// whose row was swallowed by the unique key lost a concurrent race and
/// reads as already checked in.
pub fn resolve_insert(decision: CheckInDecision, inserted: bool) -> CheckInDecision {
    if decision == CheckInDecision::Accepted && !inserted {
        CheckInDecision::AlreadyCheckedIn
    } else {
        decision
    }
}

/// Recomputes attendance stats from the full list of attended class dates.
/// `total_classes` counts every record; the streak counts distinct
/// consecutive calendar days ending today.
pub fn compute_stats(class_dates: &[NaiveDate], today: NaiveDate) -> AttendanceStats {
    let days: HashSet<NaiveDate> = class_dates.iter().copied().collect();

    let mut current_streak = 0i64;
    let mut cursor = today;
    while days.contains(&cursor) {
        current_streak += 1;
        cursor -= Duration::days(1);
    }

    AttendanceStats {
        total_classes: class_dates.len() as i64,
        current_streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        date().and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
    }

    fn decide(now: NaiveDateTime) -> CheckInDecision {
        decide_check_in(date(), time(9, 0), time(10, 0), now, false)
    }

    #[test]
    fn accepts_inside_the_window() {
        assert_eq!(decide(at(8, 46, 0)), CheckInDecision::Accepted);
        assert_eq!(decide(at(9, 30, 0)), CheckInDecision::Accepted);
        assert_eq!(decide(at(10, 0, 0)), CheckInDecision::Accepted);
    }

    #[test]
    fn boundary_at_fifteen_minutes_is_allowed() {
        assert_eq!(decide(at(8, 45, 0)), CheckInDecision::Accepted);
        assert_eq!(decide(at(8, 44, 59)), CheckInDecision::TooEarly);
    }

    #[test]
    fn rejects_too_early() {
        assert_eq!(decide(at(8, 44, 0)), CheckInDecision::TooEarly);
    }

    #[test]
    fn rejects_after_class_end() {
        assert_eq!(decide(at(10, 0, 1)), CheckInDecision::ClassEnded);
        assert_eq!(decide(at(10, 1, 0)), CheckInDecision::ClassEnded);
    }

    #[test]
    fn already_checked_in_wins_regardless_of_timing() {
        let decision = decide_check_in(date(), time(9, 0), time(10, 0), at(11, 0, 0), true);
        assert_eq!(decision, CheckInDecision::AlreadyCheckedIn);
    }

    #[test]
    fn lost_insert_race_reads_as_already_checked_in() {
        assert_eq!(
            resolve_insert(CheckInDecision::Accepted, false),
            CheckInDecision::AlreadyCheckedIn
        );
        assert_eq!(
            resolve_insert(CheckInDecision::Accepted, true),
            CheckInDecision::Accepted
        );
        assert_eq!(
            resolve_insert(CheckInDecision::TooEarly, false),
            CheckInDecision::TooEarly
        );
    }

    #[test]
    fn midnight_crossing_class_reads_as_ended_mid_class() {
        // end 01:00 < start 23:00; the naive window is inverted.
        let decision = decide_check_in(date(), time(23, 0), time(1, 0), at(23, 30, 0), false);
        assert_eq!(decision, CheckInDecision::ClassEnded);
    }

    #[test]
    fn streak_counts_consecutive_days_up_to_today() {
        let today = date();
        let dates = vec![
            today,
            today - Duration::days(1),
            today - Duration::days(2),
            today - Duration::days(5),
        ];
        let stats = compute_stats(&dates, today);
        assert_eq!(stats.total_classes, 4);
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn streak_is_zero_without_attendance_today() {
        let today = date();
        let dates = vec![today - Duration::days(1), today - Duration::days(2)];
        let stats = compute_stats(&dates, today);
        assert_eq!(stats.total_classes, 2);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn duplicate_days_count_once_for_the_streak() {
        let today = date();
        let dates = vec![today, today, today - Duration::days(1)];
        let stats = compute_stats(&dates, today);
        assert_eq!(stats.total_classes, 3);
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn empty_history_yields_zero_stats() {
        let stats = compute_stats(&[], date());
        assert_eq!(stats.total_classes, 0);
        assert_eq!(stats.current_streak, 0);
    }
}
