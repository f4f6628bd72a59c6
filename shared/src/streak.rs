//! Streak calculations over a habit's completion-day set
//!
//! # Design Principles
//!
//! 1. **Pure Functions**: no clock access; "today" is always passed in
//! 2. **Calendar-day granularity**: inputs are deduplicated calendar days
//! 3. **Open today**: an uncompleted "today" does not break a streak as
//!    long as yesterday was completed, so the count never resets while the
//!    current day is still in progress

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

/// Consecutive-day streak ending at the most recent completion.
///
/// Returns 0 when the set is empty or when the most recent completion is
/// strictly older than yesterday. Otherwise walks backward one calendar
/// day at a time from the most recent completion, counting until the
/// first gap.
pub fn current_streak(completions: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(&latest) = completions.iter().next_back() else {
        return 0;
    };

    let yesterday = today - Duration::days(1);
    if latest < yesterday {
        return 0;
    }

    let mut streak = 1;
    let mut day = latest;
    while completions.contains(&(day - Duration::days(1))) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Longest run of completions exactly one day apart, anywhere in history.
///
/// Independent of [`current_streak`]: it has no notion of "today" and a
/// long-broken run still counts.
pub fn longest_streak(completions: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;

    for &day in completions {
        run = match prev {
            Some(p) if day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }
    longest
}
