//! Engine configuration.
//!
//! Lives in `$XDG_CONFIG_HOME/levelup/config.toml` by default. Every key is
//! optional; out-of-range values are clamped by the `effective_*` accessors.
//!
//! ```toml
//! apply_streak_to_skill_xp = false
//! session_applies_skill_xp = true
//! history_limit = 500
//! utc_offset_minutes = 120
//! data_dir = "/home/me/.local/share/levelup"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProgressionError;

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "levelup";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scale session skill deltas by the streak multiplier. The multiplier is
    /// recorded on the event either way.
    #[serde(default)]
    pub apply_streak_to_skill_xp: bool,

    /// Credit a session's activity XP when it completes. Hosts that already
    /// record ticks through the session turn this off; only the streak
    /// surplus is credited then.
    #[serde(default = "default_true")]
    pub session_applies_skill_xp: bool,

    /// Events kept in history (valid: 10-10000)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Override for the local UTC offset used by time-of-day achievements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,

    /// Where state and history live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_history_limit() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            apply_streak_to_skill_xp: false,
            session_applies_skill_xp: true,
            history_limit: default_history_limit(),
            utc_offset_minutes: None,
            data_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn effective_history_limit(&self) -> usize {
        self.history_limit.clamp(10, 10_000)
    }

    /// Offset for local-time rules. Falls back to the system offset when the
    /// override is absent or out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR)))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ProgressionError> {
        toml::from_str(content).map_err(|e| ProgressionError::Config(e.to_string()))
    }

    /// Load from a file. A missing file yields defaults; a malformed one is an
    /// error.
    pub fn load_from(path: &Path) -> Result<Self, ProgressionError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ProgressionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ProgressionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ProgressionError::Config(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ProgressionError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| ProgressionError::Config(e.to_string()))
    }
}

/// Default config file path
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}
