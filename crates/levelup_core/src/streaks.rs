//! Streaks: the reward multiplier and day-streak counting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// (minimum streak, multiplier), highest first
const STREAK_MULTIPLIERS: &[(u32, f64)] = &[(30, 2.0), (14, 1.5), (7, 1.25), (2, 1.1)];

/// Reward multiplier for a consecutive-day streak.
/// Step function, non-decreasing in `streak`.
pub fn streak_multiplier(streak: u32) -> f64 {
    STREAK_MULTIPLIERS
        .iter()
        .find(|(min, _)| streak >= *min)
        .map(|(_, mult)| *mult)
        .unwrap_or(1.0)
}

/// Streak statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    /// Consecutive days ending today or yesterday
    pub current_streak: u32,
    /// Best streak ever
    pub best_streak: u32,
    /// Unique days with activity
    pub active_days: u32,
}

/// Calculate streak statistics from the days that had qualifying activity.
/// The current streak survives until the end of the day after the last
/// active day.
pub fn calculate_streaks(days: &[NaiveDate], today: NaiveDate) -> StreakStats {
    let mut days: Vec<NaiveDate> = days.to_vec();
    days.sort();
    days.dedup();

    let Some(&last_day) = days.last() else {
        return StreakStats::default();
    };

    let mut best_streak = 1u32;
    let mut streak = 1u32;
    for window in days.windows(2) {
        if window[0].succ_opt() == Some(window[1]) {
            streak += 1;
            best_streak = best_streak.max(streak);
        } else {
            streak = 1;
        }
    }

    let alive = last_day == today || last_day.succ_opt() == Some(today);
    let current_streak = if alive {
        // Count backwards from the last day
        let mut current = 1u32;
        for i in (0..days.len() - 1).rev() {
            if days[i].succ_opt() == Some(days[i + 1]) {
                current += 1;
            } else {
                break;
            }
        }
        current
    } else {
        0
    };

    StreakStats {
        current_streak,
        best_streak,
        active_days: days.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_multiplier_steps() {
        assert_eq!(streak_multiplier(0), 1.0);
        assert_eq!(streak_multiplier(1), 1.0);
        assert_eq!(streak_multiplier(2), 1.1);
        assert_eq!(streak_multiplier(6), 1.1);
        assert_eq!(streak_multiplier(7), 1.25);
        assert_eq!(streak_multiplier(14), 1.5);
        assert_eq!(streak_multiplier(29), 1.5);
        assert_eq!(streak_multiplier(30), 2.0);
        assert_eq!(streak_multiplier(100), 2.0);
    }

    #[test]
    fn test_multiplier_monotonic() {
        let mut prev = 0.0;
        for s in 0..60 {
            let m = streak_multiplier(s);
            assert!(m >= prev);
            prev = m;
        }
    }

    #[test]
    fn test_empty_streaks() {
        assert_eq!(calculate_streaks(&[], day(10)), StreakStats::default());
    }

    #[test]
    fn test_consecutive_days_alive() {
        let stats = calculate_streaks(&[day(8), day(9), day(10), day(9)], day(10));
        assert_eq!(stats.active_days, 3);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.current_streak, 3);

        // Yesterday still counts
        let stats = calculate_streaks(&[day(8), day(9)], day(10));
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn test_broken_streak() {
        let stats = calculate_streaks(&[day(1), day(2), day(3), day(6)], day(10));
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_current_counts_only_latest_run() {
        let stats = calculate_streaks(&[day(1), day(2), day(3), day(5), day(6)], day(6));
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.current_streak, 2);
    }
}
