//! Progression events.
//!
//! Immutable records of every XP or reward occurrence, kept for history and
//! audit display. Six reason codes:
//!
//! | Reason               | Built from                 | Rewards   |
//! |----------------------|----------------------------|-----------|
//! | `focus_tick`         | one allocator call         | none      |
//! | `session_complete`   | allocator over the session | none      |
//! | `achievement_unlock` | caller-supplied deltas     | non-empty |
//! | `streak_bonus`       | caller-supplied deltas     | non-empty |
//! | `skill_milestone`    | caller-supplied deltas     | non-empty |
//! | `reward_claim`       | caller-supplied deltas     | non-empty |
//!
//! The builder never deduplicates: each call gets a fresh id. Duplicate
//! effects are suppressed by the reward ledger.

use std::cell::Cell;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::allocator::{allocate_skill_xp, compute_global_xp_for_categories, delta_total, mapped_skills, SkillXpDelta};
use crate::error::ProgressionError;
use crate::rewards::RewardGrantPayload;
use crate::skills::{Category, SkillId};
use crate::streaks::streak_multiplier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    FocusTick,
    SessionComplete,
    AchievementUnlock,
    StreakBonus,
    SkillMilestone,
    RewardClaim,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FocusTick => "focus_tick",
            Self::SessionComplete => "session_complete",
            Self::AchievementUnlock => "achievement_unlock",
            Self::StreakBonus => "streak_bonus",
            Self::SkillMilestone => "skill_milestone",
            Self::RewardClaim => "reward_claim",
        }
    }

    /// Reasons whose events must carry at least one reward
    pub fn requires_rewards(&self) -> bool {
        !matches!(self, Self::FocusTick | Self::SessionComplete)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionEvent {
    pub id: String,
    /// Epoch milliseconds
    pub created_at: i64,
    pub reason_code: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_skill: Option<SkillId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier_applied: Option<f64>,
    /// Always 0 for new events. Older history may carry non-zero values.
    #[serde(default)]
    pub global_xp_delta: i64,
    #[serde(default)]
    pub skill_xp_delta: SkillXpDelta,
    #[serde(default)]
    pub rewards: Vec<RewardGrantPayload>,
    pub title: String,
    pub description: String,
}

impl ProgressionEvent {
    pub fn total_skill_xp(&self) -> u64 {
        delta_total(&self.skill_xp_delta)
    }
}

// ============================================================================
// Clock and id capabilities
// ============================================================================

pub trait Clock {
    /// Epoch milliseconds
    fn now_ms(&self) -> i64;
}

pub trait IdGenerator {
    fn new_id(&self) -> String;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Ids "evt-1", "evt-2", ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: Cell<u64>,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.get() + 1;
        self.next.set(n);
        format!("evt-{}", n)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Caller-supplied content for the reward-carrying reasons
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub source_category: Option<String>,
    pub source_skill: Option<SkillId>,
    pub duration_seconds: Option<u64>,
    pub multiplier_applied: Option<f64>,
    pub global_xp_delta: i64,
    pub skill_xp_delta: SkillXpDelta,
    pub rewards: Vec<RewardGrantPayload>,
}

impl EventDraft {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn with_rewards(mut self, rewards: Vec<RewardGrantPayload>) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_skill(mut self, skill: SkillId) -> Self {
        self.source_skill = Some(skill);
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier_applied = Some(multiplier);
        self
    }
}

pub struct EventBuilder {
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new(Box::new(SystemClock), Box::new(UuidGenerator))
    }
}

impl EventBuilder {
    pub fn new(clock: Box<dyn Clock>, ids: Box<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn stamp(&self, reason_code: ReasonCode, draft: EventDraft) -> ProgressionEvent {
        ProgressionEvent {
            id: self.ids.new_id(),
            created_at: self.clock.now_ms(),
            reason_code,
            source_category: draft.source_category,
            source_skill: draft.source_skill,
            duration_seconds: draft.duration_seconds,
            multiplier_applied: draft.multiplier_applied,
            global_xp_delta: draft.global_xp_delta,
            skill_xp_delta: draft.skill_xp_delta,
            rewards: draft.rewards,
            title: draft.title,
            description: draft.description,
        }
    }

    /// Draft shared by tick and session events
    fn activity_draft<S: AsRef<str>>(categories: &[S], seconds: f64, delta: SkillXpDelta) -> EventDraft {
        let source_category = categories
            .iter()
            .map(|c| Category::parse(c.as_ref()))
            .find(|c| !c.is_idle())
            .map(|c| c.as_str().to_string());
        EventDraft {
            source_category,
            source_skill: mapped_skills(categories).first().copied(),
            duration_seconds: Some(seconds.max(0.0).floor() as u64),
            global_xp_delta: compute_global_xp_for_categories(categories, seconds) as i64,
            skill_xp_delta: delta,
            ..Default::default()
        }
    }

    /// One tracker tick
    pub fn focus_tick<S: AsRef<str>>(&self, categories: &[S], seconds: f64) -> ProgressionEvent {
        let delta = allocate_skill_xp(categories, seconds);
        let skills = delta.len();
        let total = delta_total(&delta);
        let mut draft = Self::activity_draft(categories, seconds, delta);
        draft.title = "Focus".to_string();
        draft.description = format!("+{} XP across {} skill(s)", total, skills);
        self.stamp(ReasonCode::FocusTick, draft)
    }

    /// End of a focus session.
    ///
    /// `multiplier_applied` always holds the streak multiplier. The deltas are
    /// only scaled by it when `apply_streak_to_skill_xp` is set.
    pub fn session_complete<S: AsRef<str>>(
        &self,
        categories: &[S],
        seconds: f64,
        streak: u32,
        apply_streak_to_skill_xp: bool,
    ) -> ProgressionEvent {
        let multiplier = streak_multiplier(streak);
        let mut delta = allocate_skill_xp(categories, seconds);
        if apply_streak_to_skill_xp {
            for xp in delta.values_mut() {
                *xp = (*xp as f64 * multiplier).floor() as u64;
            }
        }

        let total = delta_total(&delta);
        let minutes = seconds.max(0.0) as u64 / 60;
        let mut draft = Self::activity_draft(categories, seconds, delta);
        draft.multiplier_applied = Some(multiplier);
        draft.title = "Session complete".to_string();
        draft.description = format!("{} min focused, +{} skill XP (streak x{})", minutes, total, multiplier);
        self.stamp(ReasonCode::SessionComplete, draft)
    }

    /// Events carrying rewards: achievement_unlock, streak_bonus,
    /// skill_milestone, reward_claim
    pub fn rewarded(&self, reason_code: ReasonCode, draft: EventDraft) -> Result<ProgressionEvent, ProgressionError> {
        if !reason_code.requires_rewards() {
            return Err(ProgressionError::InvalidEvent(format!(
                "{} events are built from activity, not drafts",
                reason_code
            )));
        }
        if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
            return Err(ProgressionError::InvalidEvent(format!(
                "{} event needs a title and description",
                reason_code
            )));
        }
        if draft.rewards.is_empty() {
            return Err(ProgressionError::InvalidEvent(format!("{} event has no rewards", reason_code)));
        }
        Ok(self.stamp(reason_code, draft))
    }

    pub fn achievement_unlock(&self, draft: EventDraft) -> Result<ProgressionEvent, ProgressionError> {
        self.rewarded(ReasonCode::AchievementUnlock, draft)
    }

    pub fn streak_bonus(&self, draft: EventDraft) -> Result<ProgressionEvent, ProgressionError> {
        self.rewarded(ReasonCode::StreakBonus, draft)
    }

    pub fn skill_milestone(&self, draft: EventDraft) -> Result<ProgressionEvent, ProgressionError> {
        self.rewarded(ReasonCode::SkillMilestone, draft)
    }

    pub fn reward_claim(&self, draft: EventDraft) -> Result<ProgressionEvent, ProgressionError> {
        self.rewarded(ReasonCode::RewardClaim, draft)
    }
}
