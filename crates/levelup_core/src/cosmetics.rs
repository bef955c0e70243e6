//! Cosmetic catalog.
//!
//! Avatars, badges and frames. Some are free, some unlock alongside an
//! achievement. Unlocking by achievement id is a side effect separate from
//! reward payloads and is idempotent at the store level.

use serde::Serialize;
use tracing::info;

use crate::achievements::RewardType;
use crate::error::StoreError;
use crate::store::CosmeticStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cosmetic {
    /// "{type}:{value}", same shape as reward payload keys
    pub key: &'static str,
    pub name: &'static str,
    pub kind: RewardType,
    /// Achievement that unlocks it; `None` means free
    pub unlocked_by: Option<&'static str>,
}

pub const COSMETICS: &[Cosmetic] = &[
    Cosmetic { key: "avatar:default", name: "Default", kind: RewardType::Avatar, unlocked_by: None },
    Cosmetic { key: "profile_frame:plain", name: "Plain frame", kind: RewardType::ProfileFrame, unlocked_by: None },
    Cosmetic { key: "avatar:sprout", name: "Sprout", kind: RewardType::Avatar, unlocked_by: Some("first_session") },
    Cosmetic { key: "avatar:runner", name: "Runner", kind: RewardType::Avatar, unlocked_by: Some("marathon") },
    Cosmetic { key: "avatar:moon", name: "Moon", kind: RewardType::Avatar, unlocked_by: Some("night_owl") },
    Cosmetic { key: "avatar:sunrise", name: "Sunrise", kind: RewardType::Avatar, unlocked_by: Some("early_bird") },
    Cosmetic { key: "profile_frame:flame", name: "Flame frame", kind: RewardType::ProfileFrame, unlocked_by: Some("streak_30") },
    Cosmetic { key: "badge:terminal", name: "Terminal", kind: RewardType::Badge, unlocked_by: Some("code_warrior") },
    Cosmetic { key: "badge:prism", name: "Prism", kind: RewardType::Badge, unlocked_by: Some("polymath") },
    Cosmetic { key: "avatar:butterfly", name: "Butterfly", kind: RewardType::Avatar, unlocked_by: Some("social_butterfly") },
    Cosmetic { key: "profile_frame:gold", name: "Gold frame", kind: RewardType::ProfileFrame, unlocked_by: Some("skill_developer_99") },
];

pub fn cosmetic_by_key(key: &str) -> Option<&'static Cosmetic> {
    COSMETICS.iter().find(|c| c.key == key)
}

/// Cosmetics that come with an achievement
pub fn cosmetics_for_achievement(achievement_id: &str) -> Vec<&'static Cosmetic> {
    COSMETICS
        .iter()
        .filter(|c| c.unlocked_by == Some(achievement_id))
        .collect()
}

/// Free cosmetics plus anything the store has unlocked
pub fn is_available<S: CosmeticStore>(store: &S, key: &str) -> Result<bool, StoreError> {
    if cosmetic_by_key(key).map(|c| c.unlocked_by.is_none()).unwrap_or(false) {
        return Ok(true);
    }
    store.is_cosmetic_unlocked(key)
}

/// Unlock every cosmetic tied to `achievement_id`. Returns the keys newly
/// unlocked; already-unlocked ones are left alone.
pub fn unlock_for_achievement<S: CosmeticStore>(store: &mut S, achievement_id: &str) -> Result<Vec<String>, StoreError> {
    let mut unlocked = Vec::new();
    for cosmetic in cosmetics_for_achievement(achievement_id) {
        if store.is_cosmetic_unlocked(cosmetic.key)? {
            continue;
        }
        store.unlock_cosmetic(cosmetic.key)?;
        info!(key = cosmetic.key, achievement = achievement_id, "cosmetic unlocked");
        unlocked.push(cosmetic.key.to_string());
    }
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::condition_for;
    use crate::store::MemoryStore;

    #[test]
    fn test_catalog_references_real_achievements() {
        for cosmetic in COSMETICS {
            if let Some(id) = cosmetic.unlocked_by {
                assert!(condition_for(id).is_some(), "{} unlocked by unknown {}", cosmetic.key, id);
            }
            assert!(cosmetic.key.starts_with(cosmetic.kind.as_str()));
        }
    }

    #[test]
    fn test_unlock_for_achievement_is_idempotent() {
        let mut store = MemoryStore::new();
        assert_eq!(unlock_for_achievement(&mut store, "marathon").unwrap(), vec!["avatar:runner"]);
        assert!(unlock_for_achievement(&mut store, "marathon").unwrap().is_empty());
        assert_eq!(store.mutation_count(), 1);
    }

    #[test]
    fn test_no_cosmetics_for_plain_achievement() {
        let mut store = MemoryStore::new();
        assert!(unlock_for_achievement(&mut store, "ten_sessions").unwrap().is_empty());
    }

    #[test]
    fn test_availability() {
        let mut store = MemoryStore::new();
        assert!(is_available(&store, "avatar:default").unwrap());
        assert!(!is_available(&store, "avatar:moon").unwrap());
        unlock_for_achievement(&mut store, "night_owl").unwrap();
        assert!(is_available(&store, "avatar:moon").unwrap());
    }
}
