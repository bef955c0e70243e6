//! Level curves.
//!
//! ## Global curve (legacy track)
//!
//! Tiered XP per level:
//! - Levels 1-10: 50 XP each
//! - Levels 11-25: 100 XP each
//! - Levels 26-50: 200 XP each
//! - Levels 51+: 400 XP each
//!
//! ## Skill curve
//!
//! Shared by all eight skills. Levels 0-99, power curve:
//! cumulative(L) = floor((L / 99)^2.2 * 3_600_000)
//!
//! 3,600,000 XP is roughly 1000 hours at 1 XP per second. Level 1 is pinned
//! to exactly 1 XP so the first tracked second always shows progress.
//!
//! Every function here clamps bad input instead of failing.

use serde::{Deserialize, Serialize};

pub const SKILL_MAX_LEVEL: u32 = 99;
pub const SKILL_MAX_XP: u64 = 3_600_000;
const SKILL_CURVE_EXPONENT: f64 = 2.2;

/// (first level of tier, XP per level in tier)
const GLOBAL_TIERS: &[(u32, u64)] = &[(1, 50), (11, 100), (26, 200), (51, 400)];

/// Title breakpoints: level -> title. Sorted ascending.
pub const TITLE_BREAKPOINTS: &[(u32, &str)] = &[
    (1, "Newbie"),
    (5, "Rookie"),
    (10, "Idly"),
    (15, "Apprentice"),
    (20, "Regular"),
    (25, "Adept"),
    (30, "Dedicated"),
    (40, "Veteran"),
    (50, "Expert"),
    (60, "Elite"),
    (70, "Master"),
    (80, "Grandmaster"),
    (90, "Legend"),
    (99, "Transcendent"),
];

/// Progress within the current level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub current: u64,
    pub needed: u64,
}

impl LevelProgress {
    /// Progress as 0.0 - 1.0
    pub fn fraction(&self) -> f64 {
        if self.needed == 0 {
            return 1.0;
        }
        (self.current as f64 / self.needed as f64).clamp(0.0, 1.0)
    }
}

/// Title threshold crossed between two levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelReward {
    pub level: u32,
    pub title: String,
}

// ============================================================================
// Global curve
// ============================================================================

/// XP needed to advance out of `level`
pub fn xp_required_for_level(level: u32) -> u64 {
    let level = level.max(1);
    GLOBAL_TIERS
        .iter()
        .rev()
        .find(|(start, _)| level >= *start)
        .map(|(_, per_level)| *per_level)
        .unwrap_or(GLOBAL_TIERS[0].1)
}

/// Total XP at which `level` starts. Level 1 starts at 0.
pub fn total_xp_for_level(level: u32) -> u64 {
    let level = level.max(1);
    let mut total = 0u64;
    for (i, &(start, per_level)) in GLOBAL_TIERS.iter().enumerate() {
        if level <= start {
            break;
        }
        let tier_end = GLOBAL_TIERS
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(u32::MAX);
        let levels_in_tier = level.min(tier_end) - start;
        total = total.saturating_add(levels_in_tier as u64 * per_level);
    }
    total
}

/// Largest level whose starting total is <= xp. Floors at 1.
pub fn level_from_total_xp(xp: i64) -> u32 {
    if xp <= 0 {
        return 1;
    }
    let xp = xp as u64;
    let mut level = 1u32;
    for &(start, per_level) in GLOBAL_TIERS.iter().rev() {
        let tier_base = total_xp_for_level(start);
        if xp >= tier_base {
            let extra = (xp - tier_base) / per_level;
            level = start.saturating_add(extra.min(u32::MAX as u64) as u32);
            break;
        }
    }
    level
}

pub fn xp_progress_in_level(xp: i64) -> LevelProgress {
    let xp = xp.max(0) as u64;
    let level = level_from_total_xp(xp as i64);
    LevelProgress {
        current: xp - total_xp_for_level(level),
        needed: xp_required_for_level(level),
    }
}

// ============================================================================
// Skill curve
// ============================================================================

/// Cumulative XP needed to reach a skill level
pub fn skill_xp_for_level(level: i64) -> u64 {
    if level <= 0 {
        return 0;
    }
    if level == 1 {
        return 1;
    }
    if level >= SKILL_MAX_LEVEL as i64 {
        return SKILL_MAX_XP;
    }
    let ratio = level as f64 / SKILL_MAX_LEVEL as f64;
    (ratio.powf(SKILL_CURVE_EXPONENT) * SKILL_MAX_XP as f64).floor() as u64
}

/// Skill level (0-99) for an XP total. Binary search over the cumulative table.
pub fn skill_level_from_xp(xp: i64) -> u32 {
    if xp <= 0 {
        return 0;
    }
    let xp = xp as u64;
    if xp >= SKILL_MAX_XP {
        return SKILL_MAX_LEVEL;
    }

    // Invariant: cumulative(lo) <= xp < cumulative(hi)
    let (mut lo, mut hi) = (0u32, SKILL_MAX_LEVEL);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if skill_xp_for_level(mid as i64) <= xp {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

pub fn skill_xp_progress(xp: i64) -> LevelProgress {
    let xp = xp.max(0) as u64;
    let level = skill_level_from_xp(xp as i64);
    if level >= SKILL_MAX_LEVEL {
        // Pinned full so downstream percentage math never divides by zero
        return LevelProgress {
            current: SKILL_MAX_XP,
            needed: SKILL_MAX_XP,
        };
    }
    let floor = skill_xp_for_level(level as i64);
    LevelProgress {
        current: xp - floor,
        needed: skill_xp_for_level(level as i64 + 1) - floor,
    }
}

// ============================================================================
// Titles
// ============================================================================

/// Highest title breakpoint <= level. Levels below the first breakpoint get
/// the first title.
pub fn title_for_level(level: u32) -> &'static str {
    TITLE_BREAKPOINTS
        .iter()
        .rev()
        .find(|(min, _)| level >= *min)
        .map(|(_, title)| *title)
        .unwrap_or(TITLE_BREAKPOINTS[0].1)
}

/// Every title breakpoint strictly above `lo` and at most `hi`
pub fn rewards_in_range(lo: u32, hi: u32) -> Vec<LevelReward> {
    TITLE_BREAKPOINTS
        .iter()
        .filter(|(level, _)| *level > lo && *level <= hi)
        .map(|(level, title)| LevelReward {
            level: *level,
            title: title.to_string(),
        })
        .collect()
}

/// Render an XP total (seconds) as hours and minutes, e.g. "12h 30m"
pub fn format_duration_xp(xp: u64) -> String {
    let hours = xp / 3600;
    let minutes = (xp % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_tier_sizes() {
        assert_eq!(xp_required_for_level(0), 50);
        assert_eq!(xp_required_for_level(1), 50);
        assert_eq!(xp_required_for_level(10), 50);
        assert_eq!(xp_required_for_level(11), 100);
        assert_eq!(xp_required_for_level(25), 100);
        assert_eq!(xp_required_for_level(26), 200);
        assert_eq!(xp_required_for_level(50), 200);
        assert_eq!(xp_required_for_level(51), 400);
        assert_eq!(xp_required_for_level(500), 400);
    }

    #[test]
    fn test_global_totals() {
        assert_eq!(total_xp_for_level(1), 0);
        assert_eq!(total_xp_for_level(2), 50);
        assert_eq!(total_xp_for_level(11), 500);
        assert_eq!(total_xp_for_level(26), 2000);
        assert_eq!(total_xp_for_level(51), 7000);
        assert_eq!(total_xp_for_level(52), 7400);
    }

    #[test]
    fn test_global_level_boundaries() {
        assert_eq!(level_from_total_xp(0), 1);
        assert_eq!(level_from_total_xp(-100), 1);
        assert_eq!(level_from_total_xp(49), 1);
        assert_eq!(level_from_total_xp(50), 2);
        assert_eq!(level_from_total_xp(499), 10);
        assert_eq!(level_from_total_xp(500), 11);
        assert_eq!(level_from_total_xp(7000), 51);
    }

    #[test]
    fn test_global_level_consistent_with_totals() {
        for level in 1..120u32 {
            let start = total_xp_for_level(level) as i64;
            assert_eq!(level_from_total_xp(start), level);
            assert_eq!(level_from_total_xp(start + xp_required_for_level(level) as i64 - 1), level);
        }
    }

    #[test]
    fn test_global_progress() {
        let p = xp_progress_in_level(520);
        assert_eq!(p, LevelProgress { current: 20, needed: 100 });
        let p = xp_progress_in_level(-5);
        assert_eq!(p, LevelProgress { current: 0, needed: 50 });
    }

    #[test]
    fn test_skill_cumulative_fixed_points() {
        assert_eq!(skill_xp_for_level(-3), 0);
        assert_eq!(skill_xp_for_level(0), 0);
        assert_eq!(skill_xp_for_level(1), 1);
        assert_eq!(skill_xp_for_level(99), SKILL_MAX_XP);
        assert_eq!(skill_xp_for_level(150), SKILL_MAX_XP);
    }

    #[test]
    fn test_skill_cumulative_strictly_increasing() {
        for level in 0..SKILL_MAX_LEVEL as i64 {
            assert!(skill_xp_for_level(level) < skill_xp_for_level(level + 1), "level {}", level);
        }
    }

    #[test]
    fn test_skill_level_boundaries() {
        assert_eq!(skill_level_from_xp(0), 0);
        assert_eq!(skill_level_from_xp(-10), 0);
        assert_eq!(skill_level_from_xp(1), 1);
        assert_eq!(skill_level_from_xp(3_600_000), 99);
        assert_eq!(skill_level_from_xp(10_000_000), 99);
        assert_eq!(skill_level_from_xp(3_599_999), 98);
    }

    #[test]
    fn test_skill_level_consistent_with_cumulative() {
        for level in 1..SKILL_MAX_LEVEL as i64 {
            let start = skill_xp_for_level(level) as i64;
            assert_eq!(skill_level_from_xp(start) as i64, level);
            assert_eq!(skill_level_from_xp(start - 1) as i64, level - 1);
        }
    }

    #[test]
    fn test_skill_progress_invariant() {
        for xp in (0..4_000_000i64).step_by(7919) {
            let p = skill_xp_progress(xp);
            if skill_level_from_xp(xp) >= SKILL_MAX_LEVEL {
                assert_eq!(p.current, p.needed);
            } else {
                assert!(p.current < p.needed, "xp {}", xp);
            }
        }
        let max = skill_xp_progress(SKILL_MAX_XP as i64);
        assert_eq!(max.current, max.needed);
        assert_eq!(max.fraction(), 1.0);
    }

    #[test]
    fn test_titles() {
        assert_eq!(title_for_level(0), "Newbie");
        assert_eq!(title_for_level(1), "Newbie");
        assert_eq!(title_for_level(4), "Newbie");
        assert_eq!(title_for_level(5), "Rookie");
        assert_eq!(title_for_level(12), "Idly");
        assert_eq!(title_for_level(99), "Transcendent");
        assert_eq!(title_for_level(300), "Transcendent");
    }

    #[test]
    fn test_rewards_in_range_is_half_open() {
        let crossed = rewards_in_range(4, 10);
        let levels: Vec<u32> = crossed.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![5, 10]);
        assert!(rewards_in_range(5, 5).is_empty());
        assert!(rewards_in_range(10, 4).is_empty());
    }

    #[test]
    fn test_format_duration_xp() {
        assert_eq!(format_duration_xp(45_000), "12h 30m");
        assert_eq!(format_duration_xp(90), "1m");
    }
}
