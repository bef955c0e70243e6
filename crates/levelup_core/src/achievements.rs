//! Achievements.
//!
//! A flat catalog of independent conditions evaluated against a state
//! snapshot. There are no chains: a streak of 14 unlocks streak_2, streak_7
//! and streak_14 in one pass if none were unlocked before. Ids already in the
//! caller's unlocked set are never returned again.
//!
//! Two entry points share the same filtering: session evaluation (grind,
//! streak, time of day, skill levels) and social evaluation (friend count).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{FixedOffset, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activity::{seconds_in_category, ActivitySegment};
use crate::skills::{Category, SkillId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Grind,
    Streak,
    Social,
    Special,
    Skill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Avatar,
    Badge,
    Title,
    SkillBoost,
    ProfileFrame,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Badge => "badge",
            Self::Title => "title",
            Self::SkillBoost => "skill_boost",
            Self::ProfileFrame => "profile_frame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementReward {
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: String,
    pub label: String,
}

/// Static catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub xp_reward: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<AchievementReward>,
    pub category: AchievementCategory,
}

/// Facts about the session that just ended
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFacts {
    pub duration_seconds: u64,
    /// Epoch milliseconds
    pub start_time: i64,
    #[serde(default)]
    pub segments: Vec<ActivitySegment>,
}

/// Counters the evaluator checks conditions against
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementSnapshot {
    pub total_sessions: u32,
    pub current_streak: u32,
    #[serde(default)]
    pub skill_levels: BTreeMap<SkillId, u32>,
    pub friend_count: u32,
    #[serde(default)]
    pub session: Option<SessionFacts>,
}

impl AchievementSnapshot {
    /// Missing skills count as level 0
    pub fn skill_level(&self, skill: SkillId) -> u32 {
        self.skill_levels.get(&skill).copied().unwrap_or(0)
    }
}

/// Newly qualifying achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedAchievement {
    pub id: String,
    pub definition: AchievementDefinition,
}

/// Condition behind an achievement id
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Sessions(u32),
    CodingSecondsInSession(u64),
    SessionSeconds(u64),
    Streak(u32),
    /// Session start hour in [from, to), local time
    StartHour { from: u32, to: u32 },
    Friends(u32),
    SkillLevel(SkillId, u32),
    SkillsAtLevel { count: usize, level: u32 },
    AllSkillsAtLevel(u32),
}

fn entry(
    id: &str,
    name: &str,
    description: &str,
    icon: &str,
    xp_reward: u64,
    category: AchievementCategory,
    reward: Option<(RewardType, &str, &str)>,
) -> AchievementDefinition {
    AchievementDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        xp_reward,
        reward: reward.map(|(reward_type, value, label)| AchievementReward {
            reward_type,
            value: value.to_string(),
            label: label.to_string(),
        }),
        category,
    }
}

/// Full catalog, in evaluation order
pub fn all_achievements() -> Vec<AchievementDefinition> {
    use AchievementCategory::*;
    use RewardType::*;

    vec![
        // Grind
        entry("first_session", "First Steps", "Complete your first focus session", "[1]", 100, Grind,
            Some((Badge, "first_steps", "First Steps badge"))),
        entry("code_warrior", "Code Warrior", "Code for 2 hours in a single session", "</>", 500, Grind,
            Some((Title, "code_warrior", "Code Warrior title"))),
        entry("marathon", "Marathon", "Stay focused for 2 hours in one session", "[2h]", 500, Grind,
            Some((ProfileFrame, "marathon", "Marathon frame"))),
        entry("ten_sessions", "Getting Serious", "Complete 10 sessions", "[10]", 250, Grind, None),
        entry("fifty_sessions", "Creature of Habit", "Complete 50 sessions", "[50]", 1000, Grind,
            Some((Avatar, "veteran", "Veteran avatar"))),

        // Streak
        entry("streak_2", "Back Again", "Keep a 2-day streak", "<2d>", 100, Streak, None),
        entry("streak_7", "Week Warrior", "Keep a 7-day streak", "<7d>", 300, Streak,
            Some((Badge, "week_warrior", "Week Warrior badge"))),
        entry("streak_14", "Fortnight Focus", "Keep a 14-day streak", "<14d>", 600, Streak,
            Some((ProfileFrame, "fortnight", "Fortnight frame"))),
        entry("streak_30", "Unstoppable", "Keep a 30-day streak", "<30d>", 1500, Streak,
            Some((Title, "unstoppable", "Unstoppable title"))),

        // Time of day
        entry("night_owl", "Night Owl", "Start a session between midnight and 5 AM", "~00~", 200, Special,
            Some((Avatar, "owl", "Owl avatar"))),
        entry("early_bird", "Early Bird", "Start a session between 4 and 7 AM", "~05~", 200, Special,
            Some((Avatar, "rooster", "Rooster avatar"))),

        // Social
        entry("first_friend", "Hello There", "Add your first friend", "<@>", 100, Social, None),
        entry("five_friends", "Squad Up", "Add 5 friends", "<5@>", 300, Social,
            Some((Badge, "squad", "Squad badge"))),
        entry("social_butterfly", "Social Butterfly", "Add 10 friends", "<10@>", 600, Social,
            Some((ProfileFrame, "butterfly", "Butterfly frame"))),

        // Skill
        entry("skill_developer_10", "Hello, World", "Reach Developer level 10", "{d10}", 300, Skill,
            Some((SkillBoost, "developer", "Developer boost"))),
        entry("skill_developer_50", "Architect", "Reach Developer level 50", "{d50}", 1000, Skill,
            Some((Title, "architect", "Architect title"))),
        entry("skill_developer_99", "Ten Thousand Hours", "Reach Developer level 99", "{d99}", 5000, Skill,
            Some((ProfileFrame, "transcendent_developer", "Transcendent frame"))),
        entry("skill_designer_10", "Pixel Pusher", "Reach Designer level 10", "{s10}", 300, Skill,
            Some((SkillBoost, "designer", "Designer boost"))),
        entry("skill_designer_50", "Visionary", "Reach Designer level 50", "{s50}", 1000, Skill,
            Some((Title, "visionary", "Visionary title"))),
        entry("skill_gamer_25", "Button Masher", "Reach Gamer level 25", "{g25}", 500, Skill,
            Some((Badge, "controller", "Controller badge"))),
        entry("polymath", "Polymath", "Reach level 25 in three skills", "{3x}", 1000, Skill,
            Some((Title, "polymath", "Polymath title"))),
        entry("jack_of_all_trades", "Jack of All Trades", "Reach level 10 in every skill", "{8x}", 800, Skill,
            Some((Badge, "jack", "Jack badge"))),
    ]
}

/// Condition for a catalog id
pub fn condition_for(id: &str) -> Option<Condition> {
    let condition = match id {
        "first_session" => Condition::Sessions(1),
        "code_warrior" => Condition::CodingSecondsInSession(7200),
        "marathon" => Condition::SessionSeconds(7200),
        "ten_sessions" => Condition::Sessions(10),
        "fifty_sessions" => Condition::Sessions(50),

        "streak_2" => Condition::Streak(2),
        "streak_7" => Condition::Streak(7),
        "streak_14" => Condition::Streak(14),
        "streak_30" => Condition::Streak(30),

        "night_owl" => Condition::StartHour { from: 0, to: 5 },
        "early_bird" => Condition::StartHour { from: 4, to: 7 },

        "first_friend" => Condition::Friends(1),
        "five_friends" => Condition::Friends(5),
        "social_butterfly" => Condition::Friends(10),

        "skill_developer_10" => Condition::SkillLevel(SkillId::Developer, 10),
        "skill_developer_50" => Condition::SkillLevel(SkillId::Developer, 50),
        "skill_developer_99" => Condition::SkillLevel(SkillId::Developer, 99),
        "skill_designer_10" => Condition::SkillLevel(SkillId::Designer, 10),
        "skill_designer_50" => Condition::SkillLevel(SkillId::Designer, 50),
        "skill_gamer_25" => Condition::SkillLevel(SkillId::Gamer, 25),
        "polymath" => Condition::SkillsAtLevel { count: 3, level: 25 },
        "jack_of_all_trades" => Condition::AllSkillsAtLevel(10),

        _ => return None,
    };
    Some(condition)
}

/// Catalog lookup. A miss is logged and reported as `None`.
pub fn achievement_by_id(id: &str) -> Option<AchievementDefinition> {
    let found = all_achievements().into_iter().find(|a| a.id == id);
    if found.is_none() {
        warn!(id, "unknown achievement id");
    }
    found
}

pub fn achievements_in_category(category: AchievementCategory) -> Vec<AchievementDefinition> {
    all_achievements()
        .into_iter()
        .filter(|a| a.category == category)
        .collect()
}

/// Definitions for a set of unlocked ids, skipping ids the catalog no longer has
pub fn definitions_for(ids: &BTreeSet<String>) -> Vec<AchievementDefinition> {
    ids.iter().filter_map(|id| achievement_by_id(id)).collect()
}

fn start_hour(session: &SessionFacts, offset: &FixedOffset) -> Option<u32> {
    Utc.timestamp_millis_opt(session.start_time)
        .single()
        .map(|t| t.with_timezone(offset).hour())
}

/// Fraction of the way to meeting a condition, 0.0 - 1.0.
/// Boolean conditions report 0.0 or 1.0.
fn condition_progress(condition: Condition, snapshot: &AchievementSnapshot, offset: &FixedOffset) -> f64 {
    fn ratio(have: f64, need: f64) -> f64 {
        if need <= 0.0 {
            return 1.0;
        }
        (have / need).clamp(0.0, 1.0)
    }

    match condition {
        Condition::Sessions(n) => ratio(snapshot.total_sessions as f64, n as f64),
        Condition::CodingSecondsInSession(secs) => {
            let coding = snapshot
                .session
                .as_ref()
                .map(|s| seconds_in_category(&s.segments, &Category::Coding))
                .unwrap_or(0);
            ratio(coding as f64, secs as f64)
        }
        Condition::SessionSeconds(secs) => {
            let duration = snapshot.session.as_ref().map(|s| s.duration_seconds).unwrap_or(0);
            ratio(duration as f64, secs as f64)
        }
        Condition::Streak(n) => ratio(snapshot.current_streak as f64, n as f64),
        Condition::StartHour { from, to } => {
            let hit = snapshot
                .session
                .as_ref()
                .and_then(|s| start_hour(s, offset))
                .map(|h| h >= from && h < to)
                .unwrap_or(false);
            if hit { 1.0 } else { 0.0 }
        }
        Condition::Friends(n) => ratio(snapshot.friend_count as f64, n as f64),
        Condition::SkillLevel(skill, level) => ratio(snapshot.skill_level(skill) as f64, level as f64),
        Condition::SkillsAtLevel { count, level } => {
            let reached = SkillId::ALL
                .iter()
                .filter(|s| snapshot.skill_level(**s) >= level)
                .count();
            ratio(reached as f64, count as f64)
        }
        Condition::AllSkillsAtLevel(level) => {
            let reached = SkillId::ALL
                .iter()
                .filter(|s| snapshot.skill_level(**s) >= level)
                .count();
            ratio(reached as f64, SkillId::ALL.len() as f64)
        }
    }
}

fn condition_met(condition: Condition, snapshot: &AchievementSnapshot, offset: &FixedOffset) -> bool {
    condition_progress(condition, snapshot, offset) >= 1.0
}

/// Progress toward one achievement, for display. `None` for unknown ids.
pub fn achievement_progress(id: &str, snapshot: &AchievementSnapshot, offset: &FixedOffset) -> Option<f64> {
    condition_for(id).map(|c| condition_progress(c, snapshot, offset))
}

fn evaluate(
    categories: &[AchievementCategory],
    snapshot: &AchievementSnapshot,
    unlocked: &BTreeSet<String>,
    offset: &FixedOffset,
) -> Vec<UnlockedAchievement> {
    let mut newly = Vec::new();
    for def in all_achievements() {
        if !categories.contains(&def.category) || unlocked.contains(&def.id) {
            continue;
        }
        let Some(condition) = condition_for(&def.id) else {
            warn!(id = %def.id, "achievement has no condition, skipping");
            continue;
        };
        if condition_met(condition, snapshot, offset) {
            debug!(id = %def.id, "achievement condition met");
            newly.push(UnlockedAchievement {
                id: def.id.clone(),
                definition: def,
            });
        }
    }
    newly
}

/// Achievements newly earned by a session, in catalog order
pub fn evaluate_session_achievements(
    snapshot: &AchievementSnapshot,
    unlocked: &BTreeSet<String>,
    offset: &FixedOffset,
) -> Vec<UnlockedAchievement> {
    use AchievementCategory::*;
    evaluate(&[Grind, Streak, Special, Skill], snapshot, unlocked, offset)
}

/// Achievements newly earned from the friend count
pub fn evaluate_social_achievements(friend_count: u32, unlocked: &BTreeSet<String>) -> Vec<UnlockedAchievement> {
    let snapshot = AchievementSnapshot {
        friend_count,
        ..Default::default()
    };
    evaluate(&[AchievementCategory::Social], &snapshot, unlocked, &Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn ids(list: &[UnlockedAchievement]) -> Vec<&str> {
        list.iter().map(|a| a.id.as_str()).collect()
    }

    /// 2024-01-01 at the given UTC hour, epoch ms
    fn at_hour(hour: i64) -> i64 {
        (1_704_067_200 + hour * 3600) * 1000
    }

    fn session(hour: i64, coding_secs: i64, duration: u64) -> SessionFacts {
        let start = at_hour(hour);
        SessionFacts {
            duration_seconds: duration,
            start_time: start,
            segments: vec![ActivitySegment::new("coding", start, start + coding_secs * 1000)],
        }
    }

    #[test]
    fn test_catalog_is_consistent() {
        let all = all_achievements();
        let unique: BTreeSet<_> = all.iter().map(|a| a.id.clone()).collect();
        assert_eq!(unique.len(), all.len());
        for def in &all {
            assert!(condition_for(&def.id).is_some(), "no condition for {}", def.id);
        }
    }

    #[test]
    fn test_streaks_are_independent() {
        let snapshot = AchievementSnapshot {
            current_streak: 14,
            ..Default::default()
        };
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &utc());
        assert_eq!(ids(&got), vec!["streak_2", "streak_7", "streak_14"]);
    }

    #[test]
    fn test_grind_session() {
        let snapshot = AchievementSnapshot {
            total_sessions: 1,
            session: Some(session(12, 7200, 7200)),
            ..Default::default()
        };
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &utc());
        assert_eq!(ids(&got), vec!["first_session", "code_warrior", "marathon"]);
    }

    #[test]
    fn test_coding_threshold_is_per_category() {
        let snapshot = AchievementSnapshot {
            total_sessions: 3,
            session: Some(session(12, 7199, 9000)),
            ..Default::default()
        };
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &utc());
        assert!(ids(&got).contains(&"marathon"));
        assert!(!ids(&got).contains(&"code_warrior"));
    }

    #[test]
    fn test_time_of_day_overlap() {
        let at = |hour| AchievementSnapshot {
            session: Some(session(hour, 60, 60)),
            ..Default::default()
        };
        let none = BTreeSet::new();
        assert_eq!(ids(&evaluate_session_achievements(&at(4), &none, &utc())), vec!["night_owl", "early_bird"]);
        assert_eq!(ids(&evaluate_session_achievements(&at(2), &none, &utc())), vec!["night_owl"]);
        assert_eq!(ids(&evaluate_session_achievements(&at(6), &none, &utc())), vec!["early_bird"]);
        assert!(evaluate_session_achievements(&at(7), &none, &utc()).is_empty());
    }

    #[test]
    fn test_time_of_day_uses_local_offset() {
        // 23:00 UTC is 02:00 at UTC+3
        let snapshot = AchievementSnapshot {
            session: Some(session(23, 60, 60)),
            ..Default::default()
        };
        let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &plus3);
        assert_eq!(ids(&got), vec!["night_owl"]);
    }

    #[test]
    fn test_skill_conditions() {
        let mut levels = BTreeMap::new();
        for skill in SkillId::ALL {
            levels.insert(skill, 10);
        }
        levels.insert(SkillId::Developer, 50);
        levels.insert(SkillId::Designer, 25);
        levels.insert(SkillId::Gamer, 25);
        let snapshot = AchievementSnapshot {
            skill_levels: levels,
            ..Default::default()
        };
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &utc());
        assert_eq!(
            ids(&got),
            vec![
                "skill_developer_10",
                "skill_developer_50",
                "skill_designer_10",
                "skill_gamer_25",
                "polymath",
                "jack_of_all_trades"
            ]
        );
    }

    #[test]
    fn test_missing_skills_are_level_zero() {
        let mut levels = BTreeMap::new();
        levels.insert(SkillId::Developer, 99);
        let snapshot = AchievementSnapshot {
            skill_levels: levels,
            ..Default::default()
        };
        let got = evaluate_session_achievements(&snapshot, &BTreeSet::new(), &utc());
        assert!(!ids(&got).contains(&"jack_of_all_trades"));
        assert!(ids(&got).contains(&"skill_developer_99"));
    }

    #[test]
    fn test_feeding_back_unlocked_is_idempotent() {
        let snapshot = AchievementSnapshot {
            total_sessions: 12,
            current_streak: 30,
            session: Some(session(4, 8000, 8000)),
            ..Default::default()
        };
        let mut unlocked = BTreeSet::new();
        let first = evaluate_session_achievements(&snapshot, &unlocked, &utc());
        assert!(!first.is_empty());
        unlocked.extend(first.iter().map(|a| a.id.clone()));
        assert!(evaluate_session_achievements(&snapshot, &unlocked, &utc()).is_empty());
    }

    #[test]
    fn test_social_is_separate() {
        let none = BTreeSet::new();
        assert_eq!(ids(&evaluate_social_achievements(5, &none)), vec!["first_friend", "five_friends"]);

        // Session evaluation never returns social achievements
        let snapshot = AchievementSnapshot {
            friend_count: 20,
            ..Default::default()
        };
        assert!(evaluate_session_achievements(&snapshot, &none, &utc()).is_empty());

        let mut unlocked = BTreeSet::new();
        unlocked.insert("first_friend".to_string());
        assert_eq!(ids(&evaluate_social_achievements(10, &unlocked)), vec!["five_friends", "social_butterfly"]);
    }

    #[test]
    fn test_progress_and_lookup() {
        let snapshot = AchievementSnapshot {
            total_sessions: 5,
            ..Default::default()
        };
        assert_eq!(achievement_progress("ten_sessions", &snapshot, &utc()), Some(0.5));
        assert_eq!(achievement_progress("no_such_thing", &snapshot, &utc()), None);
        assert!(achievement_by_id("no_such_thing").is_none());
        assert_eq!(achievements_in_category(AchievementCategory::Streak).len(), 4);

        let mut ids = BTreeSet::new();
        ids.insert("marathon".to_string());
        ids.insert("retired_achievement".to_string());
        assert_eq!(definitions_for(&ids).len(), 1);
    }

    #[test]
    fn test_definition_wire_format() {
        let def = achievement_by_id("night_owl").unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["xpReward"], 200);
        assert_eq!(json["reward"]["type"], "avatar");
        assert_eq!(json["category"], "special");
    }
}
