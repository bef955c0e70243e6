//! Storage collaborators.
//!
//! The engine reads and writes state only through these traits. Hosts bring
//! their own persistence; two adapters ship here:
//!
//! - `MemoryStore`: everything in memory, used by tests and short-lived hosts
//! - `JsonFileStore`: one JSON document under a data directory, rewritten
//!   atomically after each mutation

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::skills::SkillId;

/// State file name inside the data directory
pub const STATE_FILE: &str = "state.json";

/// Stored XP total for one skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillXp {
    pub skill_id: SkillId,
    pub total_xp: u64,
}

pub trait SkillXpStore {
    fn all_skill_xp(&self) -> Result<Vec<SkillXp>, StoreError>;
    fn add_skill_xp(&mut self, skill: SkillId, amount: u64) -> Result<(), StoreError>;
}

/// Unlocked achievement ids. Ids are never removed.
pub trait AchievementStore {
    fn unlocked_ids(&self) -> Result<BTreeSet<String>, StoreError>;
    fn unlock_achievement(&mut self, id: &str) -> Result<(), StoreError>;
}

/// Idempotency keys of reward payloads already granted.
/// Loaded once per grant batch and saved once after it.
pub trait ClaimedKeyStore {
    fn load_claimed_keys(&self) -> Result<BTreeSet<String>, StoreError>;
    fn save_claimed_keys(&mut self, keys: &BTreeSet<String>) -> Result<(), StoreError>;
}

/// Cosmetic unlocks. Unlocking twice is a no-op.
pub trait CosmeticStore {
    fn is_cosmetic_unlocked(&self, key: &str) -> Result<bool, StoreError>;
    fn unlock_cosmetic(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Everything the engine facade needs
pub trait ProgressStore: SkillXpStore + AchievementStore + ClaimedKeyStore + CosmeticStore {}

impl<T> ProgressStore for T where T: SkillXpStore + AchievementStore + ClaimedKeyStore + CosmeticStore {}

/// Persisted progression state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default)]
    pub skill_xp: BTreeMap<SkillId, u64>,
    #[serde(default)]
    pub unlocked_achievements: BTreeSet<String>,
    #[serde(default)]
    pub claimed_reward_keys: BTreeSet<String>,
    #[serde(default)]
    pub cosmetics: BTreeSet<String>,
    /// Host counters fed into achievement snapshots
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub friend_count: u32,
    #[serde(default)]
    pub active_days: BTreeSet<NaiveDate>,
}

impl StoreState {
    fn all_skill_xp(&self) -> Vec<SkillXp> {
        SkillId::ALL
            .iter()
            .map(|skill| SkillXp {
                skill_id: *skill,
                total_xp: self.skill_xp.get(skill).copied().unwrap_or(0),
            })
            .collect()
    }

    fn add_skill_xp(&mut self, skill: SkillId, amount: u64) {
        let total = self.skill_xp.entry(skill).or_insert(0);
        *total = total.saturating_add(amount);
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store. Counts mutations and can simulate failures per store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: StoreState,
    mutations: usize,
    fail_skill_writes: bool,
    fail_cosmetic_writes: bool,
    fail_key_loads: bool,
    fail_key_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn skill_xp(&self, skill: SkillId) -> u64 {
        self.state.skill_xp.get(&skill).copied().unwrap_or(0)
    }

    /// Number of write calls that changed or replaced state
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    /// Make `add_skill_xp` fail until switched off
    pub fn fail_skill_writes(&mut self, fail: bool) {
        self.fail_skill_writes = fail;
    }

    /// Make `unlock_cosmetic` fail until switched off
    pub fn fail_cosmetic_writes(&mut self, fail: bool) {
        self.fail_cosmetic_writes = fail;
    }

    /// Make `load_claimed_keys` fail until switched off
    pub fn fail_key_loads(&mut self, fail: bool) {
        self.fail_key_loads = fail;
    }

    /// Make `save_claimed_keys` fail until switched off
    pub fn fail_key_saves(&mut self, fail: bool) {
        self.fail_key_saves = fail;
    }
}

fn offline(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{} store offline", what))
}

impl SkillXpStore for MemoryStore {
    fn all_skill_xp(&self) -> Result<Vec<SkillXp>, StoreError> {
        Ok(self.state.all_skill_xp())
    }

    fn add_skill_xp(&mut self, skill: SkillId, amount: u64) -> Result<(), StoreError> {
        if self.fail_skill_writes {
            return Err(offline("skill"));
        }
        self.state.add_skill_xp(skill, amount);
        self.mutations += 1;
        Ok(())
    }
}

impl AchievementStore for MemoryStore {
    fn unlocked_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.state.unlocked_achievements.clone())
    }

    fn unlock_achievement(&mut self, id: &str) -> Result<(), StoreError> {
        if self.state.unlocked_achievements.insert(id.to_string()) {
            self.mutations += 1;
        }
        Ok(())
    }
}

impl ClaimedKeyStore for MemoryStore {
    fn load_claimed_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        if self.fail_key_loads {
            return Err(offline("claimed key"));
        }
        Ok(self.state.claimed_reward_keys.clone())
    }

    fn save_claimed_keys(&mut self, keys: &BTreeSet<String>) -> Result<(), StoreError> {
        if self.fail_key_saves {
            return Err(offline("claimed key"));
        }
        self.state.claimed_reward_keys = keys.clone();
        self.mutations += 1;
        Ok(())
    }
}

impl CosmeticStore for MemoryStore {
    fn is_cosmetic_unlocked(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.cosmetics.contains(key))
    }

    fn unlock_cosmetic(&mut self, key: &str) -> Result<(), StoreError> {
        if self.fail_cosmetic_writes {
            return Err(offline("cosmetic"));
        }
        if self.state.cosmetics.insert(key.to_string()) {
            self.mutations += 1;
        }
        Ok(())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Write via temp file + rename so a crash never leaves a torn state file
pub fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

/// File-backed store. The whole state is one pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: StoreState,
}

impl JsonFileStore {
    /// Open (or start) the store in `data_dir`. A missing file is an empty
    /// state; a corrupt file is an error, never silently reset.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let path = data_dir.join(STATE_FILE);
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            debug!(path = %path.display(), "no state file yet, starting empty");
            StoreState::default()
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.state)?;
        atomic_write(&self.path, &content)?;
        Ok(())
    }

    /// Record a completed session on `day`. Returns the new session count.
    pub fn record_session(&mut self, day: NaiveDate) -> Result<u32, StoreError> {
        self.state.total_sessions = self.state.total_sessions.saturating_add(1);
        self.state.active_days.insert(day);
        self.save()?;
        Ok(self.state.total_sessions)
    }

    pub fn set_friend_count(&mut self, count: u32) -> Result<(), StoreError> {
        self.state.friend_count = count;
        self.save()
    }

    pub fn active_days(&self) -> Vec<NaiveDate> {
        self.state.active_days.iter().copied().collect()
    }

    fn mutate<F>(&mut self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreState) -> bool,
    {
        if f(&mut self.state) {
            if let Err(e) = self.save() {
                warn!(path = %self.path.display(), "failed to persist state: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl SkillXpStore for JsonFileStore {
    fn all_skill_xp(&self) -> Result<Vec<SkillXp>, StoreError> {
        Ok(self.state.all_skill_xp())
    }

    fn add_skill_xp(&mut self, skill: SkillId, amount: u64) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.add_skill_xp(skill, amount);
            true
        })
    }
}

impl AchievementStore for JsonFileStore {
    fn unlocked_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.state.unlocked_achievements.clone())
    }

    fn unlock_achievement(&mut self, id: &str) -> Result<(), StoreError> {
        self.mutate(|s| s.unlocked_achievements.insert(id.to_string()))
    }
}

impl ClaimedKeyStore for JsonFileStore {
    fn load_claimed_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.state.claimed_reward_keys.clone())
    }

    fn save_claimed_keys(&mut self, keys: &BTreeSet<String>) -> Result<(), StoreError> {
        let keys = keys.clone();
        self.mutate(|s| {
            s.claimed_reward_keys = keys;
            true
        })
    }
}

impl CosmeticStore for JsonFileStore {
    fn is_cosmetic_unlocked(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.cosmetics.contains(key))
    }

    fn unlock_cosmetic(&mut self, key: &str) -> Result<(), StoreError> {
        self.mutate(|s| s.cosmetics.insert(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_idempotent_unlocks() {
        let mut store = MemoryStore::new();
        store.unlock_cosmetic("badge:owl").unwrap();
        store.unlock_cosmetic("badge:owl").unwrap();
        store.unlock_achievement("marathon").unwrap();
        store.unlock_achievement("marathon").unwrap();
        assert_eq!(store.mutation_count(), 2);
        assert!(store.is_cosmetic_unlocked("badge:owl").unwrap());
        assert_eq!(store.unlocked_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_all_skill_xp_lists_every_skill() {
        let mut store = MemoryStore::new();
        store.add_skill_xp(SkillId::Gamer, 30).unwrap();
        let all = store.all_skill_xp().unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all.iter().find(|s| s.skill_id == SkillId::Gamer).unwrap().total_xp, 30);
        assert_eq!(all.iter().find(|s| s.skill_id == SkillId::Listener).unwrap().total_xp, 0);
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempdir().unwrap();
        {
            let mut store = JsonFileStore::open(dir.path()).unwrap();
            store.add_skill_xp(SkillId::Developer, 120).unwrap();
            store.unlock_achievement("first_session").unwrap();
            store.unlock_cosmetic("badge:first_steps").unwrap();
            let mut keys = BTreeSet::new();
            keys.insert("skill|developer||100|First Steps XP".to_string());
            store.save_claimed_keys(&keys).unwrap();
            let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
            assert_eq!(store.record_session(day).unwrap(), 1);
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.state().skill_xp.get(&SkillId::Developer), Some(&120));
        assert!(store.unlocked_ids().unwrap().contains("first_session"));
        assert!(store.is_cosmetic_unlocked("badge:first_steps").unwrap());
        assert_eq!(store.load_claimed_keys().unwrap().len(), 1);
        assert_eq!(store.state().total_sessions, 1);
        assert_eq!(store.active_days().len(), 1);
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE), "{not json").unwrap();
        let err = JsonFileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn test_state_tolerates_missing_fields() {
        let state: StoreState = serde_json::from_str(r#"{"skillXp":{"gamer":5}}"#).unwrap();
        assert_eq!(state.skill_xp.get(&SkillId::Gamer), Some(&5));
        assert!(state.claimed_reward_keys.is_empty());
    }
}
