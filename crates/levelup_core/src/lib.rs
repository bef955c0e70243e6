//! Core of the LevelUp productivity tracker.
//!
//! Turns tracked activity into skill XP, evaluates achievements and grants
//! their rewards at most once. Persistence is behind the traits in [`store`].

pub mod achievements;
pub mod activity;
pub mod allocator;
pub mod config;
pub mod cosmetics;
pub mod curves;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod rewards;
pub mod skills;
pub mod store;
pub mod streaks;

pub use achievements::{AchievementDefinition, AchievementSnapshot, UnlockedAchievement};
pub use activity::ActivitySegment;
pub use allocator::{allocate_skill_xp, SkillXpDelta};
pub use config::EngineConfig;
pub use engine::{ProgressionEngine, SessionInput, SessionOutcome};
pub use error::{ProgressionError, StoreError};
pub use events::{EventBuilder, ProgressionEvent, ReasonCode};
pub use history::{EventHistory, JsonlHistory};
pub use rewards::{GrantReport, RewardGrantPayload, RewardLedger};
pub use skills::{Category, SkillId};
pub use store::{JsonFileStore, MemoryStore, ProgressStore};
pub use streaks::{calculate_streaks, streak_multiplier};
