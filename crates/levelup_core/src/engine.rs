//! Progression engine.
//!
//! Wires the pure pieces to a store: allocate time, apply skill XP, evaluate
//! achievements, grant their rewards through the ledger. Every operation
//! returns the events it produced so the host can append them to history.
//!
//! Title milestones are detected by comparing skill levels before and after
//! an operation, so XP from rewards counts the same as XP from activity.
//!
//! Achievement rewards are re-derived from the persisted unlocked set on every
//! evaluation pass. Payloads that failed or were lost to a crash are offered
//! again and the claimed-key set drops the ones already paid.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::achievements::{
    definitions_for, evaluate_session_achievements, evaluate_social_achievements, AchievementSnapshot,
    SessionFacts, UnlockedAchievement,
};
use crate::activity::ActivitySegment;
use crate::allocator::{allocate_skill_xp, SkillXpDelta};
use crate::config::EngineConfig;
use crate::cosmetics;
use crate::curves::{rewards_in_range, skill_level_from_xp};
use crate::error::ProgressionError;
use crate::events::{EventBuilder, EventDraft, ProgressionEvent};
use crate::rewards::{payloads_for_achievement, GrantReport, RewardDestination, RewardGrantPayload, RewardLedger};
use crate::skills::SkillId;
use crate::store::{AchievementStore, ClaimedKeyStore, ProgressStore, SkillXpStore};
use crate::streaks::streak_multiplier;

/// Base skill XP of a daily streak bonus, before the multiplier
pub const STREAK_BONUS_BASE_XP: u64 = 300;

/// What the host knows about a finished session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    pub categories: Vec<String>,
    pub duration_seconds: f64,
    pub streak: u32,
    /// Sessions completed including this one
    pub total_sessions: u32,
    pub friend_count: u32,
    /// Epoch milliseconds
    pub start_time: i64,
    #[serde(default)]
    pub segments: Vec<ActivitySegment>,
}

impl SessionInput {
    /// Session where every category was active for the whole duration
    pub fn from_categories<S: AsRef<str>>(categories: &[S], duration_seconds: f64, start_time: i64) -> Self {
        let end_time = start_time.saturating_add((duration_seconds.max(0.0) * 1000.0) as i64);
        let segments = categories
            .iter()
            .map(|c| ActivitySegment::new(c.as_ref(), start_time, end_time))
            .collect();
        Self {
            categories: categories.iter().map(|c| c.as_ref().to_string()).collect(),
            duration_seconds,
            start_time,
            segments,
            ..Default::default()
        }
    }
}

/// Everything one engine operation produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub events: Vec<ProgressionEvent>,
    pub unlocked: Vec<UnlockedAchievement>,
    pub grants: GrantReport,
    /// Catalog cosmetics unlocked by achievement id
    pub cosmetics: Vec<String>,
}

impl SessionOutcome {
    /// Payloads that failed and can be retried with `claim_rewards`
    pub fn retryable(&self) -> Vec<RewardGrantPayload> {
        self.grants.failed.iter().map(|f| f.payload.clone()).collect()
    }
}

pub struct ProgressionEngine<S> {
    store: S,
    events: EventBuilder,
    config: EngineConfig,
    offset: FixedOffset,
}

impl<S: ProgressStore> ProgressionEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_builder(store, EventBuilder::default(), config)
    }

    pub fn with_builder(store: S, events: EventBuilder, config: EngineConfig) -> Self {
        let offset = config.utc_offset();
        Self {
            store,
            events,
            config,
            offset,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current level of every skill
    pub fn skill_levels(&self) -> Result<BTreeMap<SkillId, u32>, ProgressionError> {
        Ok(self
            .store
            .all_skill_xp()?
            .into_iter()
            .map(|s| (s.skill_id, skill_level_from_xp(s.total_xp.min(i64::MAX as u64) as i64)))
            .collect())
    }

    /// One tracker tick: allocate, apply, report milestones
    pub fn record_tick<C: AsRef<str>>(&mut self, categories: &[C], seconds: f64) -> Result<Vec<ProgressionEvent>, ProgressionError> {
        let before = self.skill_levels()?;
        let event = self.events.focus_tick(categories, seconds);
        self.apply_delta(&event.skill_xp_delta)?;

        let mut outcome = SessionOutcome {
            events: vec![event],
            ..Default::default()
        };
        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome.events)
    }

    /// End of a session: session event, achievements, their rewards
    pub fn complete_session(&mut self, input: &SessionInput) -> Result<SessionOutcome, ProgressionError> {
        let before = self.skill_levels()?;
        let event = self.events.session_complete(
            &input.categories,
            input.duration_seconds,
            input.streak,
            self.config.apply_streak_to_skill_xp,
        );
        if self.config.session_applies_skill_xp {
            self.apply_delta(&event.skill_xp_delta)?;
        } else {
            // Ticks already credited the plain split
            let ticked = allocate_skill_xp(&input.categories, input.duration_seconds);
            let surplus: SkillXpDelta = event
                .skill_xp_delta
                .iter()
                .map(|(skill, xp)| (*skill, xp.saturating_sub(ticked.get(skill).copied().unwrap_or(0))))
                .collect();
            self.apply_delta(&surplus)?;
        }

        let mut outcome = SessionOutcome {
            events: vec![event],
            ..Default::default()
        };
        self.settle_unlocked(&mut outcome)?;

        let snapshot = AchievementSnapshot {
            total_sessions: input.total_sessions,
            current_streak: input.streak,
            skill_levels: self.skill_levels()?,
            friend_count: input.friend_count,
            session: Some(SessionFacts {
                duration_seconds: input.duration_seconds.max(0.0).floor() as u64,
                start_time: input.start_time,
                segments: input.segments.clone(),
            }),
        };
        let unlocked = self.store.unlocked_ids()?;
        let newly = evaluate_session_achievements(&snapshot, &unlocked, &self.offset);
        self.unlock_all(newly, &mut outcome)?;

        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome)
    }

    /// Friend count changed: social achievements only
    pub fn update_friends(&mut self, friend_count: u32) -> Result<SessionOutcome, ProgressionError> {
        let before = self.skill_levels()?;
        let mut outcome = SessionOutcome::default();
        self.settle_unlocked(&mut outcome)?;

        let unlocked = self.store.unlocked_ids()?;
        let newly = evaluate_social_achievements(friend_count, &unlocked);
        self.unlock_all(newly, &mut outcome)?;
        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome)
    }

    /// Grant arbitrary payloads. A reward_claim event is emitted only when
    /// something was actually granted.
    pub fn claim_rewards(&mut self, payloads: &[RewardGrantPayload], title: &str) -> Result<SessionOutcome, ProgressionError> {
        let before = self.skill_levels()?;
        let mut outcome = SessionOutcome::default();
        self.grant_as_claim(payloads, title, &mut outcome)?;
        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome)
    }

    /// Offer again any reward of an unlocked achievement that is not claimed
    /// yet. Sessions and friend updates do this on their own.
    pub fn retry_pending_rewards(&mut self) -> Result<SessionOutcome, ProgressionError> {
        let before = self.skill_levels()?;
        let mut outcome = SessionOutcome::default();
        self.settle_unlocked(&mut outcome)?;
        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome)
    }

    /// Daily streak bonus. Keyed by day, so it pays out at most once per day.
    pub fn grant_streak_bonus(&mut self, streak: u32, day: NaiveDate) -> Result<SessionOutcome, ProgressionError> {
        if streak < 2 {
            debug!(streak, "no streak bonus below two days");
            return Ok(SessionOutcome::default());
        }

        let multiplier = streak_multiplier(streak);
        let amount = (STREAK_BONUS_BASE_XP as f64 * multiplier).floor() as u64;
        let payload = RewardGrantPayload::skill(
            SkillId::Researcher,
            amount,
            &format!("Streak day {} ({})", streak, day),
        );

        let before = self.skill_levels()?;
        let report = RewardLedger::new(&mut self.store).grant(std::slice::from_ref(&payload));

        let mut outcome = SessionOutcome::default();
        if !report.granted.is_empty() {
            let draft = EventDraft {
                skill_xp_delta: granted_skill_xp(&report.granted),
                ..EventDraft::new(
                    &format!("{}-day streak", streak),
                    &format!("+{} XP streak bonus (x{})", amount, multiplier),
                )
            }
            .with_skill(SkillId::Researcher)
            .with_multiplier(multiplier)
            .with_rewards(vec![payload]);
            outcome.events.push(self.events.streak_bonus(draft)?);
        }
        outcome.grants = report;

        self.emit_milestones(&before, &mut outcome)?;
        Ok(outcome)
    }

    fn apply_delta(&mut self, delta: &SkillXpDelta) -> Result<(), ProgressionError> {
        for (skill, xp) in delta {
            if *xp > 0 {
                self.store.add_skill_xp(*skill, *xp)?;
            }
        }
        Ok(())
    }

    fn grant_as_claim(&mut self, payloads: &[RewardGrantPayload], title: &str, outcome: &mut SessionOutcome) -> Result<(), ProgressionError> {
        let report = RewardLedger::new(&mut self.store).grant(payloads);
        if !report.granted.is_empty() {
            let draft = EventDraft {
                skill_xp_delta: granted_skill_xp(&report.granted),
                ..EventDraft::new(title, &format!("{} reward(s) claimed", report.granted.len()))
            }
            .with_rewards(report.granted.clone());
            outcome.events.push(self.events.reward_claim(draft)?);
        }
        outcome.grants.merge(report);
        Ok(())
    }

    /// Re-derive payloads and catalog cosmetics for every unlocked id and
    /// grant whatever is still unclaimed
    fn settle_unlocked(&mut self, outcome: &mut SessionOutcome) -> Result<(), ProgressionError> {
        let unlocked = self.store.unlocked_ids()?;
        if unlocked.is_empty() {
            return Ok(());
        }
        let claimed = match self.store.load_claimed_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("claimed keys unavailable, pending rewards left for later: {}", e);
                return Ok(());
            }
        };

        for def in definitions_for(&unlocked) {
            outcome
                .cosmetics
                .extend(cosmetics::unlock_for_achievement(&mut self.store, &def.id)?);

            let pending: Vec<RewardGrantPayload> = payloads_for_achievement(&def)
                .into_iter()
                .filter(|p| !claimed.contains(&p.key()))
                .collect();
            if pending.is_empty() {
                continue;
            }
            debug!(id = %def.id, pending = pending.len(), "re-offering unclaimed rewards");
            self.grant_as_claim(&pending, &format!("{} rewards", def.name), outcome)?;
        }
        Ok(())
    }

    /// Rewards and cosmetics first, then the id. A crash in between leaves
    /// the achievement to be earned again; a failed payload is picked up by
    /// the next settle pass.
    fn unlock_all(&mut self, newly: Vec<UnlockedAchievement>, outcome: &mut SessionOutcome) -> Result<(), ProgressionError> {
        for achievement in newly {
            let def = &achievement.definition;
            let payloads = payloads_for_achievement(def);
            let report = RewardLedger::new(&mut self.store).grant(&payloads);
            if !payloads.is_empty() {
                let draft = EventDraft {
                    skill_xp_delta: granted_skill_xp(&report.granted),
                    ..EventDraft::new(&def.name, &def.description)
                }
                .with_rewards(payloads);
                outcome.events.push(self.events.achievement_unlock(draft)?);
            }
            outcome.grants.merge(report);

            outcome
                .cosmetics
                .extend(cosmetics::unlock_for_achievement(&mut self.store, &achievement.id)?);

            self.store.unlock_achievement(&achievement.id)?;
            info!(id = %achievement.id, "achievement unlocked");
            outcome.unlocked.push(achievement);
        }
        Ok(())
    }

    /// Grant a title payload per crossed breakpoint and emit skill_milestone
    /// events for the ones granted
    fn emit_milestones(&mut self, before: &BTreeMap<SkillId, u32>, outcome: &mut SessionOutcome) -> Result<(), ProgressionError> {
        let after = self.skill_levels()?;
        for (skill, level) in &after {
            let old = before.get(skill).copied().unwrap_or(0);
            for reward in rewards_in_range(old, *level) {
                let name = skill.definition().name;
                let payload = RewardGrantPayload::cosmetic(
                    &format!("title:{}_{}", skill.as_str(), reward.title.to_lowercase()),
                    &format!("{} {}", name, reward.title),
                );
                let report = RewardLedger::new(&mut self.store).grant(std::slice::from_ref(&payload));
                if !report.granted.is_empty() {
                    info!(skill = %skill, level = reward.level, title = %reward.title, "skill milestone");
                    let draft = EventDraft::new(
                        &format!("{} is now {}", name, reward.title),
                        &format!("{} reached level {}", name, reward.level),
                    )
                    .with_skill(*skill)
                    .with_rewards(vec![payload]);
                    outcome.events.push(self.events.skill_milestone(draft)?);
                }
                outcome.grants.merge(report);
            }
        }
        Ok(())
    }
}

fn granted_skill_xp(granted: &[RewardGrantPayload]) -> SkillXpDelta {
    let mut delta = SkillXpDelta::new();
    for payload in granted {
        if payload.destination != RewardDestination::Skill {
            continue;
        }
        if let (Some(skill), Some(amount)) = (payload.skill_id, payload.amount) {
            *delta.entry(skill).or_insert(0) += amount;
        }
    }
    delta
}
