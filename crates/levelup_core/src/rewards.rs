//! Reward grant ledger.
//!
//! Turns achievement definitions into reward payloads and applies each
//! payload at most once. The claimed-key set is the only idempotency boundary
//! in the engine: a payload whose key is already claimed is skipped, so a
//! double-click or a replay after restart never double-grants.
//!
//! ## Batch discipline
//!
//! 1. Load the claimed keys once
//! 2. For each payload in order: check key, apply effect, record key in memory
//! 3. Save the whole set once at the end
//!
//! A payload whose effect fails stays unclaimed and is reported as failed;
//! the rest of the batch still runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::achievements::{AchievementCategory, AchievementDefinition, RewardType};
use crate::skills::{normalize_skill_id, SkillId};
use crate::store::{ClaimedKeyStore, CosmeticStore, SkillXpStore};

/// Skill XP granted by a skill_boost reward (30 minutes)
pub const SKILL_BOOST_SECONDS: u64 = 1800;

const KEY_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardDestination {
    /// Retired global XP pool. Granted payloads have no store effect.
    Global,
    Skill,
    Cosmetic,
}

impl RewardDestination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Skill => "skill",
            Self::Cosmetic => "cosmetic",
        }
    }
}

/// One unit of reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardGrantPayload {
    pub destination: RewardDestination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<SkillId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmetic_key: Option<String>,
    pub label: String,
}

impl RewardGrantPayload {
    pub fn skill(skill: SkillId, amount: u64, label: &str) -> Self {
        Self {
            destination: RewardDestination::Skill,
            amount: Some(amount),
            skill_id: Some(skill),
            cosmetic_key: None,
            label: label.to_string(),
        }
    }

    pub fn cosmetic(key: &str, label: &str) -> Self {
        Self {
            destination: RewardDestination::Cosmetic,
            amount: None,
            skill_id: None,
            cosmetic_key: Some(key.to_string()),
            label: label.to_string(),
        }
    }

    /// Deterministic idempotency key: destination|skill|cosmetic|amount|label
    pub fn key(&self) -> String {
        [
            self.destination.as_str().to_string(),
            self.skill_id.map(|s| s.as_str().to_string()).unwrap_or_default(),
            self.cosmetic_key.clone().unwrap_or_default(),
            self.amount.map(|a| a.to_string()).unwrap_or_default(),
            self.label.clone(),
        ]
        .join(KEY_SEPARATOR)
    }
}

/// Free-function form of [`RewardGrantPayload::key`]
pub fn reward_key(payload: &RewardGrantPayload) -> String {
    payload.key()
}

/// Skill that receives an achievement's flat XP reward
pub fn fallback_skill_for(def: &AchievementDefinition) -> SkillId {
    match def.category {
        AchievementCategory::Social => SkillId::Communicator,
        AchievementCategory::Special => SkillId::Learner,
        AchievementCategory::Streak => SkillId::Researcher,
        AchievementCategory::Skill => match &def.reward {
            Some(reward) if reward.reward_type == RewardType::SkillBoost => normalize_skill_id(&reward.value),
            _ => SkillId::Developer,
        },
        AchievementCategory::Grind => SkillId::Developer,
    }
}

/// Payloads an achievement grants, in order: flat XP, then its reward
pub fn payloads_for_achievement(def: &AchievementDefinition) -> Vec<RewardGrantPayload> {
    let mut payloads = Vec::new();

    if def.xp_reward > 0 {
        payloads.push(RewardGrantPayload::skill(
            fallback_skill_for(def),
            def.xp_reward,
            &format!("{} XP", def.name),
        ));
    }

    if let Some(reward) = &def.reward {
        if reward.reward_type == RewardType::SkillBoost {
            payloads.push(RewardGrantPayload::skill(
                normalize_skill_id(&reward.value),
                SKILL_BOOST_SECONDS,
                &reward.label,
            ));
        } else {
            payloads.push(RewardGrantPayload::cosmetic(
                &format!("{}:{}", reward.reward_type.as_str(), reward.value),
                &reward.label,
            ));
        }
    }

    payloads
}

/// Payload that could not be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedGrant {
    pub payload: RewardGrantPayload,
    pub error: String,
}

/// Outcome of one grant batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantReport {
    pub granted: Vec<RewardGrantPayload>,
    pub skipped: Vec<RewardGrantPayload>,
    pub failed: Vec<FailedGrant>,
    /// Claimed keys could not be loaded; the whole batch was refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    /// Claimed keys could not be flushed after granting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
}

impl GrantReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.load_error.is_none() && self.save_error.is_none()
    }

    pub fn merge(&mut self, other: GrantReport) {
        self.granted.extend(other.granted);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        if self.load_error.is_none() {
            self.load_error = other.load_error;
        }
        if self.save_error.is_none() {
            self.save_error = other.save_error;
        }
    }
}

/// Applies payloads against the stores, at most once per key
pub struct RewardLedger<'a, S> {
    store: &'a mut S,
}

impl<'a, S> RewardLedger<'a, S>
where
    S: SkillXpStore + CosmeticStore + ClaimedKeyStore,
{
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Grant a batch of payloads. Never fails as a whole; see [`GrantReport`].
    pub fn grant(&mut self, payloads: &[RewardGrantPayload]) -> GrantReport {
        let mut report = GrantReport::default();
        if payloads.is_empty() {
            return report;
        }

        let mut claimed = match self.store.load_claimed_keys() {
            Ok(keys) => keys,
            Err(e) => {
                // Without the ledger we cannot tell what was already paid out
                warn!("claimed keys unavailable, refusing batch: {}", e);
                report.failed = payloads
                    .iter()
                    .map(|p| FailedGrant {
                        payload: p.clone(),
                        error: e.to_string(),
                    })
                    .collect();
                report.load_error = Some(e.to_string());
                return report;
            }
        };

        for payload in payloads {
            let key = payload.key();
            if claimed.contains(&key) {
                debug!(key = %key, "reward already claimed");
                report.skipped.push(payload.clone());
                continue;
            }

            match self.apply(payload) {
                Ok(()) => {
                    info!(key = %key, "reward granted");
                    claimed.insert(key);
                    report.granted.push(payload.clone());
                }
                Err(e) => {
                    warn!(key = %key, "reward grant failed: {}", e);
                    report.failed.push(FailedGrant {
                        payload: payload.clone(),
                        error: e,
                    });
                }
            }
        }

        if !report.granted.is_empty() {
            if let Err(e) = self.store.save_claimed_keys(&claimed) {
                warn!("failed to flush claimed reward keys: {}", e);
                report.save_error = Some(e.to_string());
            }
        }

        report
    }

    fn apply(&mut self, payload: &RewardGrantPayload) -> Result<(), String> {
        match payload.destination {
            RewardDestination::Skill => {
                let skill = payload
                    .skill_id
                    .ok_or_else(|| "skill payload without skill id".to_string())?;
                let amount = payload.amount.unwrap_or(0);
                self.store.add_skill_xp(skill, amount).map_err(|e| e.to_string())
            }
            RewardDestination::Cosmetic => {
                let key = payload
                    .cosmetic_key
                    .as_deref()
                    .ok_or_else(|| "cosmetic payload without key".to_string())?;
                if self.store.is_cosmetic_unlocked(key).map_err(|e| e.to_string())? {
                    return Ok(());
                }
                self.store.unlock_cosmetic(key).map_err(|e| e.to_string())
            }
            RewardDestination::Global => Ok(()),
        }
    }
}

/// Keys for a payload list, for hosts that pre-check claims
pub fn keys_for(payloads: &[RewardGrantPayload]) -> BTreeSet<String> {
    payloads.iter().map(RewardGrantPayload::key).collect()
}
