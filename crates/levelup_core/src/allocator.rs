//! Skill XP allocator.
//!
//! Splits whole seconds of tracked time across the skills of every active
//! category. Runs once per tracker tick, so it must never award more than the
//! elapsed time no matter how many categories are active.

use std::collections::BTreeMap;

use tracing::debug;

use crate::skills::{Category, SkillId};

/// Skill -> XP earned in one computation
pub type SkillXpDelta = BTreeMap<SkillId, u64>;

/// Sum of all values in a delta
pub fn delta_total(delta: &SkillXpDelta) -> u64 {
    delta.values().sum()
}

/// Distinct skills for the active categories, in first-seen order. Idle is
/// dropped.
pub fn mapped_skills<S: AsRef<str>>(categories: &[S]) -> Vec<SkillId> {
    let mut skills = Vec::new();
    for raw in categories {
        let category = Category::parse(raw.as_ref());
        if category.is_idle() {
            continue;
        }
        let skill = category.skill();
        if !skills.contains(&skill) {
            skills.push(skill);
        }
    }
    skills
}

/// Split `duration_seconds` of activity across the mapped skills.
///
/// - total = floor(duration); base = total / n; the first `total % n` skills
///   get one extra
/// - sub-second ticks that would round everything to zero give 1 XP to the
///   first skill
/// - no active categories or non-positive duration yields an empty map
pub fn allocate_skill_xp<S: AsRef<str>>(categories: &[S], duration_seconds: f64) -> SkillXpDelta {
    let mut delta = SkillXpDelta::new();

    // NaN fails this comparison too
    if !(duration_seconds > 0.0) {
        return delta;
    }

    let skills = mapped_skills(categories);
    if skills.is_empty() {
        return delta;
    }

    let total = duration_seconds.floor() as u64;
    let count = skills.len() as u64;
    let base = total / count;
    let remainder = total % count;

    for (i, skill) in skills.iter().enumerate() {
        let extra = if (i as u64) < remainder { 1 } else { 0 };
        delta.insert(*skill, base + extra);
    }

    if total == 0 {
        delta.insert(skills[0], 1);
    }

    debug!(
        skills = skills.len(),
        total,
        allocated = delta_total(&delta),
        "allocated skill xp"
    );
    delta
}

/// Global XP for a set of categories. The global track is retired, so this
/// is always zero; kept for callers still wired to it.
pub fn compute_global_xp_for_categories<S: AsRef<str>>(_categories: &[S], _duration_seconds: f64) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_category_single_second() {
        let delta = allocate_skill_xp(&["coding"], 1.0);
        assert_eq!(delta.get(&SkillId::Developer), Some(&1));
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn test_two_categories_one_second() {
        let delta = allocate_skill_xp(&["coding", "music"], 1.0);
        assert_eq!(delta.get(&SkillId::Developer), Some(&1));
        assert_eq!(delta.get(&SkillId::Listener), Some(&0));
        assert_eq!(delta_total(&delta), 1);
    }

    #[test]
    fn test_remainder_goes_to_first_seen() {
        // music is seen first, so the listener gets the extra second
        let delta = allocate_skill_xp(&["music", "coding", "design"], 8.0);
        assert_eq!(delta[&SkillId::Listener], 3);
        assert_eq!(delta[&SkillId::Developer], 3);
        assert_eq!(delta[&SkillId::Designer], 2);
        assert_eq!(delta_total(&delta), 8);
    }

    #[test]
    fn test_duplicates_and_idle() {
        let delta = allocate_skill_xp(&["coding", "idle", "coding", "other", "browsing"], 10.0);
        // other and browsing both map to researcher
        assert_eq!(delta.len(), 2);
        assert_eq!(delta[&SkillId::Developer], 5);
        assert_eq!(delta[&SkillId::Researcher], 5);
    }

    #[test]
    fn test_sub_second_floor() {
        let delta = allocate_skill_xp(&["games", "social"], 0.4);
        assert_eq!(delta[&SkillId::Gamer], 1);
        assert_eq!(delta[&SkillId::Communicator], 0);
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&str; 0] = [];
        assert!(allocate_skill_xp(&none, 10.0).is_empty());
        assert!(allocate_skill_xp(&["idle"], 10.0).is_empty());
        assert!(allocate_skill_xp(&["coding"], 0.0).is_empty());
        assert!(allocate_skill_xp(&["coding"], -5.0).is_empty());
        assert!(allocate_skill_xp(&["coding"], f64::NAN).is_empty());
    }

    #[test]
    fn test_conservation() {
        let cats = ["coding", "design", "games", "social", "browsing", "creative", "learning", "music"];
        for n in 1..=cats.len() {
            for d in 0..40u64 {
                let delta = allocate_skill_xp(&cats[..n], d as f64);
                let sum = delta_total(&delta);
                assert!(sum <= d, "n={} d={} sum={}", n, d, sum);
                if d >= n as u64 {
                    assert_eq!(sum, d);
                }
            }
        }
    }

    #[test]
    fn test_global_xp_retired() {
        assert_eq!(compute_global_xp_for_categories(&["coding"], 3600.0), 0);
    }
}
