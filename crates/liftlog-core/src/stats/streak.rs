//! Completion streak statistics.
//!
//! Derives current/longest consecutive-day streaks and a recent activity
//! calendar from the local calendar dates of completed workouts. A day with
//! no workout yet today does not break the current streak; a streak of zero
//! is a valid value, not an error.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default bounded lookback for the longest streak and the calendar.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// One day of the activity calendar. Days with zero workouts are present
/// with a zero count, not missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub workouts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    /// Consecutive days ending today or yesterday with a completed workout.
    pub current_streak: u32,
    /// Longest consecutive-day run within the lookback window.
    pub longest_streak: u32,
    /// Per-day workout counts over the lookback window, oldest first.
    pub calendar: Vec<DayActivity>,
}

/// Derives streak statistics from completed-workout dates.
#[derive(Debug, Clone)]
pub struct StreakCalculator {
    lookback_days: u32,
}

impl StreakCalculator {
    pub fn new() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback(lookback_days: u32) -> Self {
        Self { lookback_days }
    }

    /// Summarize `dates` (one entry per completed workout, local calendar
    /// dates, duplicates allowed) as of `today`.
    pub fn summarize(&self, dates: &[NaiveDate], today: NaiveDate) -> StreakSummary {
        let distinct: BTreeSet<NaiveDate> = dates.iter().copied().collect();

        let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
        for date in dates {
            *counts.entry(*date).or_insert(0) += 1;
        }

        // The current streak is anchored at today, or at yesterday when
        // today's workout simply hasn't happened yet.
        let yesterday = today - Duration::days(1);
        let anchor = if distinct.contains(&today) {
            Some(today)
        } else if distinct.contains(&yesterday) {
            Some(yesterday)
        } else {
            None
        };
        let mut current_streak = 0;
        if let Some(mut day) = anchor {
            while distinct.contains(&day) {
                current_streak += 1;
                day -= Duration::days(1);
            }
        }

        let window_start = today - Duration::days(i64::from(self.lookback_days) - 1);
        let mut longest_streak = 0u32;
        let mut run = 0u32;
        let mut calendar = Vec::with_capacity(self.lookback_days as usize);
        let mut day = window_start;
        while day <= today {
            let workouts = counts.get(&day).copied().unwrap_or(0);
            calendar.push(DayActivity { date: day, workouts });
            if workouts > 0 {
                run += 1;
                longest_streak = longest_streak.max(run);
            } else {
                run = 0;
            }
            day += Duration::days(1);
        }

        StreakSummary {
            current_streak,
            longest_streak,
            calendar,
        }
    }
}

impl Default for StreakCalculator {
    fn default() -> Self {
        Self::new()
    }
}
