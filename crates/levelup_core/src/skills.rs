//! Skills and activity categories.
//!
//! Eight fixed skill tracks. Categories come from the window tracker and map
//! many-to-one onto skills. Pinned ordering for deterministic behavior:
//! Developer, Designer, Gamer, Communicator, Researcher, Creator, Learner, Listener

use serde::{Deserialize, Serialize};

/// One of the eight progression tracks.
/// Order is pinned; it decides iteration order in XP maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    Developer,
    Designer,
    Gamer,
    Communicator,
    Researcher,
    Creator,
    Learner,
    Listener,
}

impl SkillId {
    pub const ALL: [SkillId; 8] = [
        SkillId::Developer,
        SkillId::Designer,
        SkillId::Gamer,
        SkillId::Communicator,
        SkillId::Researcher,
        SkillId::Creator,
        SkillId::Learner,
        SkillId::Listener,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Designer => "designer",
            Self::Gamer => "gamer",
            Self::Communicator => "communicator",
            Self::Researcher => "researcher",
            Self::Creator => "creator",
            Self::Learner => "learner",
            Self::Listener => "listener",
        }
    }

    /// Static definition for this skill
    pub fn definition(&self) -> &'static SkillDefinition {
        // SKILLS is declared in the same order as the enum
        &SKILLS[*self as usize]
    }

    pub fn from_id(id: &str) -> Option<SkillId> {
        SkillId::ALL.iter().copied().find(|s| s.as_str() == id)
    }
}

impl Default for SkillId {
    fn default() -> Self {
        DEFAULT_SKILL
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fallback skill for anything we cannot classify
pub const DEFAULT_SKILL: SkillId = SkillId::Researcher;

/// Static skill metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub category: Category,
}

pub static SKILLS: [SkillDefinition; 8] = [
    SkillDefinition { id: SkillId::Developer, name: "Developer", icon: "</>", color: "#5b8def", category: Category::Coding },
    SkillDefinition { id: SkillId::Designer, name: "Designer", icon: "[~]", color: "#e06ccf", category: Category::Design },
    SkillDefinition { id: SkillId::Gamer, name: "Gamer", icon: "(>)", color: "#e5534b", category: Category::Games },
    SkillDefinition { id: SkillId::Communicator, name: "Communicator", icon: "<@>", color: "#3fb27f", category: Category::Social },
    SkillDefinition { id: SkillId::Researcher, name: "Researcher", icon: "(?)", color: "#d4a72c", category: Category::Browsing },
    SkillDefinition { id: SkillId::Creator, name: "Creator", icon: "{*}", color: "#f0883e", category: Category::Creative },
    SkillDefinition { id: SkillId::Learner, name: "Learner", icon: "[=]", color: "#8a63d2", category: Category::Learning },
    SkillDefinition { id: SkillId::Listener, name: "Listener", icon: "~d~", color: "#2fb5c9", category: Category::Music },
];

/// Activity category reported by the window tracker.
///
/// The taxonomy is open on the wire, so anything unrecognised lands in
/// `Unknown` and still classifies (to the fallback skill).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Coding,
    Design,
    Games,
    Social,
    Browsing,
    Creative,
    Learning,
    Music,
    Other,
    Idle,
    Unknown(String),
}

impl Category {
    /// Lenient parse: case-insensitive, never fails
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "coding" => Self::Coding,
            "design" => Self::Design,
            "games" => Self::Games,
            "social" => Self::Social,
            "browsing" => Self::Browsing,
            "creative" => Self::Creative,
            "learning" => Self::Learning,
            "music" => Self::Music,
            "other" => Self::Other,
            "idle" => Self::Idle,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Coding => "coding",
            Self::Design => "design",
            Self::Games => "games",
            Self::Social => "social",
            Self::Browsing => "browsing",
            Self::Creative => "creative",
            Self::Learning => "learning",
            Self::Music => "music",
            Self::Other => "other",
            Self::Idle => "idle",
            Self::Unknown(s) => s,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Skill this category trains. Exhaustive; idle has no real skill and
    /// gets the fallback, but the allocator filters it before asking.
    pub fn skill(&self) -> SkillId {
        match self {
            Self::Coding => SkillId::Developer,
            Self::Design => SkillId::Designer,
            Self::Games => SkillId::Gamer,
            Self::Social => SkillId::Communicator,
            Self::Browsing => SkillId::Researcher,
            Self::Creative => SkillId::Creator,
            Self::Learning => SkillId::Learner,
            Self::Music => SkillId::Listener,
            Self::Other | Self::Idle | Self::Unknown(_) => DEFAULT_SKILL,
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::parse(&s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a raw tracker category to a skill. Never fails.
pub fn category_to_skill_id(category: &str) -> SkillId {
    Category::parse(category).skill()
}

/// Resolve a legacy category name, canonical skill id, or display name to a
/// canonical skill id. Unrecognised input falls back to the default skill.
pub fn normalize_skill_id(raw: &str) -> SkillId {
    let needle = raw.trim().to_lowercase();

    if let Some(skill) = SkillId::from_id(&needle) {
        return skill;
    }

    if let Some(def) = SKILLS.iter().find(|d| d.name.to_lowercase() == needle) {
        return def.id;
    }

    // Legacy category names ("coding", "music", ...)
    Category::parse(&needle).skill()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum_order() {
        for (i, skill) in SkillId::ALL.iter().enumerate() {
            assert_eq!(SKILLS[i].id, *skill);
            assert_eq!(skill.definition().id, *skill);
        }
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(category_to_skill_id("coding"), SkillId::Developer);
        assert_eq!(category_to_skill_id("design"), SkillId::Designer);
        assert_eq!(category_to_skill_id("games"), SkillId::Gamer);
        assert_eq!(category_to_skill_id("social"), SkillId::Communicator);
        assert_eq!(category_to_skill_id("browsing"), SkillId::Researcher);
        assert_eq!(category_to_skill_id("creative"), SkillId::Creator);
        assert_eq!(category_to_skill_id("learning"), SkillId::Learner);
        assert_eq!(category_to_skill_id("music"), SkillId::Listener);
        assert_eq!(category_to_skill_id("other"), SkillId::Researcher);
    }

    #[test]
    fn test_unknown_category_falls_back() {
        assert_eq!(category_to_skill_id("spreadsheets"), DEFAULT_SKILL);
        assert_eq!(category_to_skill_id(""), DEFAULT_SKILL);
        assert_eq!(
            Category::parse("Spreadsheets"),
            Category::Unknown("spreadsheets".to_string())
        );
    }

    #[test]
    fn test_normalize_all_three_forms() {
        assert_eq!(normalize_skill_id("developer"), SkillId::Developer);
        assert_eq!(normalize_skill_id("Developer"), SkillId::Developer);
        assert_eq!(normalize_skill_id("coding"), SkillId::Developer);
        assert_eq!(normalize_skill_id("  Music "), SkillId::Listener);
        assert_eq!(normalize_skill_id("listener"), SkillId::Listener);
        assert_eq!(normalize_skill_id("nonsense"), SkillId::Researcher);
    }

    #[test]
    fn test_category_serde_is_lenient() {
        let c: Category = serde_json::from_str("\"CODING\"").unwrap();
        assert_eq!(c, Category::Coding);
        let u: Category = serde_json::from_str("\"cad\"").unwrap();
        assert_eq!(serde_json::to_string(&u).unwrap(), "\"cad\"");
    }
}
