//! Activity segments from the window tracker.
//!
//! A segment is one continuous foreground-window observation. Segments are
//! read, never mutated. A segment without a category is treated as idle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::allocator::{allocate_skill_xp, SkillXpDelta};
use crate::skills::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySegment {
    #[serde(default)]
    pub category: Option<String>,
    /// Epoch milliseconds
    pub start_time: i64,
    /// Epoch milliseconds
    pub end_time: i64,
}

impl ActivitySegment {
    pub fn new(category: &str, start_time: i64, end_time: i64) -> Self {
        Self {
            category: Some(category.to_string()),
            start_time,
            end_time,
        }
    }

    /// Elapsed seconds. Inverted segments count as zero.
    pub fn duration_seconds(&self) -> f64 {
        self.end_time.saturating_sub(self.start_time).max(0) as f64 / 1000.0
    }

    pub fn category(&self) -> Category {
        self.category
            .as_deref()
            .map(Category::parse)
            .unwrap_or(Category::Idle)
    }
}

/// Whole seconds per category across a session. Idle and uncategorized time
/// is left out.
pub fn category_seconds(segments: &[ActivitySegment]) -> BTreeMap<String, u64> {
    let mut millis: BTreeMap<String, i64> = BTreeMap::new();
    for seg in segments {
        let category = seg.category();
        if category.is_idle() {
            continue;
        }
        let total = millis.entry(category.as_str().to_string()).or_insert(0);
        *total = total.saturating_add(seg.end_time.saturating_sub(seg.start_time).max(0));
    }
    millis
        .into_iter()
        .map(|(cat, ms)| (cat, (ms / 1000) as u64))
        .collect()
}

/// Seconds spent in one category
pub fn seconds_in_category(segments: &[ActivitySegment], category: &Category) -> u64 {
    category_seconds(segments)
        .get(category.as_str())
        .copied()
        .unwrap_or(0)
}

/// First start and last end across the segments
pub fn session_span(segments: &[ActivitySegment]) -> Option<(i64, i64)> {
    let start = segments.iter().map(|s| s.start_time).min()?;
    let end = segments.iter().map(|s| s.end_time).max()?;
    Some((start, end.max(start)))
}

/// Skill XP for a batch of segments. Time is summed per category first, so
/// many short segments do not each collect the sub-second floor.
pub fn allocate_segments(segments: &[ActivitySegment]) -> SkillXpDelta {
    let mut delta = SkillXpDelta::new();
    for (category, seconds) in category_seconds(segments) {
        for (skill, xp) in allocate_skill_xp(&[category.as_str()], seconds as f64) {
            *delta.entry(skill).or_insert(0) += xp;
        }
    }
    delta
}
