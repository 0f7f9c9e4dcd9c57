mod streak;

pub use streak::{DayActivity, StreakCalculator, StreakSummary, DEFAULT_LOOKBACK_DAYS};
