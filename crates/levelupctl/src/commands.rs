//! Command handlers for levelupctl.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use chrono::{NaiveDate, Utc};
use levelup_core::achievements::{achievement_progress, all_achievements, AchievementSnapshot};
use levelup_core::config::config_path;
use levelup_core::curves::{format_duration_xp, skill_level_from_xp, skill_xp_progress, title_for_level};
use levelup_core::history::summarize;
use levelup_core::store::{AchievementStore, SkillXpStore};
use levelup_core::{
    calculate_streaks, EngineConfig, JsonFileStore, JsonlHistory, ProgressionEngine, ProgressionEvent, SessionInput,
    SessionOutcome, SkillId,
};
use owo_colors::OwoColorize;
use tracing::debug;

use crate::output::{header, print_events, print_grants, print_kv, progress_bar};

pub struct Context {
    pub config: EngineConfig,
    pub data_dir: PathBuf,
}

impl Context {
    pub fn load(config_file: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let path = config_file.map(Path::to_path_buf).unwrap_or_else(config_path);
        let config = EngineConfig::load_from(&path).with_context(|| format!("loading config {}", path.display()))?;
        let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
        debug!(data_dir = %data_dir.display(), "using data directory");
        Ok(Self { config, data_dir })
    }

    fn open_store(&self) -> Result<JsonFileStore> {
        JsonFileStore::open(&self.data_dir).with_context(|| format!("opening state in {}", self.data_dir.display()))
    }

    fn open_engine(&self) -> Result<ProgressionEngine<JsonFileStore>> {
        Ok(ProgressionEngine::new(self.open_store()?, self.config.clone()))
    }

    fn history(&self) -> JsonlHistory {
        JsonlHistory::in_dir(&self.data_dir, self.config.effective_history_limit())
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.utc_offset()).date_naive()
    }

    fn current_streak(&self, store: &JsonFileStore) -> u32 {
        calculate_streaks(&store.active_days(), self.today()).current_streak
    }

    /// Streak as it will be once today is recorded
    fn streak_with_today(&self, store: &JsonFileStore) -> u32 {
        let mut days = store.active_days();
        days.push(self.today());
        calculate_streaks(&days, self.today()).current_streak
    }

    /// Append to history and print
    fn record(&self, events: &[ProgressionEvent]) -> Result<()> {
        self.history()
            .append_all(events)
            .with_context(|| format!("writing history in {}", self.data_dir.display()))?;
        print_events(events, &self.config.utc_offset());
        Ok(())
    }

    fn report(&self, title: &str, outcome: &SessionOutcome) -> Result<()> {
        header(title);
        self.record(&outcome.events)?;
        print_grants(&outcome.grants);
        for key in &outcome.cosmetics {
            println!("  {} cosmetic {}", "*".yellow(), key);
        }
        Ok(())
    }
}

pub fn tick(ctx: &Context, categories: &[String], seconds: f64) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    let events = engine.record_tick(categories, seconds)?;
    header("Tick");
    ctx.record(&events)
}

pub fn session(
    ctx: &Context,
    categories: &[String],
    seconds: f64,
    streak: Option<u32>,
    start_hour: Option<u32>,
    sessions: Option<u32>,
) -> Result<()> {
    let offset = ctx.config.utc_offset();
    let today = ctx.today();
    let start_time = match start_hour {
        Some(hour) => {
            let Some(start) = today.and_hms_opt(hour, 0, 0) else {
                bail!("start hour must be 0-23, got {}", hour);
            };
            start
                .and_local_timezone(offset)
                .single()
                .map(|t| t.timestamp_millis())
                .context("start time does not exist in this offset")?
        }
        None => Utc::now().timestamp_millis().saturating_sub((seconds.max(0.0) * 1000.0) as i64),
    };

    let mut engine = ctx.open_engine()?;
    let state = engine.store().state();
    let mut input = SessionInput::from_categories(categories, seconds, start_time);
    input.total_sessions = sessions.unwrap_or(state.total_sessions.saturating_add(1));
    input.friend_count = state.friend_count;
    input.streak = streak.unwrap_or_else(|| ctx.streak_with_today(engine.store()));

    let outcome = engine.complete_session(&input)?;
    // Counted only once the session went through
    engine.store_mut().record_session(today)?;
    ctx.report(&format!("Session #{} (streak {})", input.total_sessions, input.streak), &outcome)
}

pub fn friends(ctx: &Context, count: u32) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    engine.store_mut().set_friend_count(count)?;
    let outcome = engine.update_friends(count)?;
    ctx.report(&format!("Friends: {}", count), &outcome)
}

pub fn streak_bonus(ctx: &Context, streak: Option<u32>) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    let streak = streak.unwrap_or_else(|| ctx.current_streak(engine.store()));
    let outcome = engine.grant_streak_bonus(streak, ctx.today())?;
    ctx.report(&format!("Streak bonus (day {})", streak), &outcome)
}

pub fn status(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    header(&format!("levelupctl v{}", env!("CARGO_PKG_VERSION")));
    for skill in store.all_skill_xp()? {
        let def = skill.skill_id.definition();
        let xp = skill.total_xp.min(i64::MAX as u64) as i64;
        let level = skill_level_from_xp(xp);
        let progress = skill_xp_progress(xp);
        println!(
            "  {} {:<13} Lv {:>2}  {:<12} {} {}",
            def.icon,
            def.name.bold(),
            level,
            title_for_level(level),
            progress_bar(progress.fraction(), 20),
            format_duration_xp(skill.total_xp).dimmed()
        );
    }

    let stats = calculate_streaks(&store.active_days(), ctx.today());
    let state = store.state();
    println!();
    print_kv("sessions", &state.total_sessions.to_string());
    print_kv("streak", &format!("{} days (best {})", stats.current_streak, stats.best_streak));
    print_kv("active days", &stats.active_days.to_string());
    print_kv("friends", &state.friend_count.to_string());
    print_kv(
        "achievements",
        &format!("{}/{}", state.unlocked_achievements.len(), all_achievements().len()),
    );
    print_kv("cosmetics", &state.cosmetics.len().to_string());
    print_kv("data", &ctx.data_dir.display().to_string());
    Ok(())
}

pub fn achievements(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let unlocked = store.unlocked_ids()?;
    let skill_levels: BTreeMap<SkillId, u32> = store
        .all_skill_xp()?
        .into_iter()
        .map(|s| (s.skill_id, skill_level_from_xp(s.total_xp.min(i64::MAX as u64) as i64)))
        .collect();
    let snapshot = AchievementSnapshot {
        total_sessions: store.state().total_sessions,
        current_streak: ctx.current_streak(&store),
        skill_levels,
        friend_count: store.state().friend_count,
        session: None,
    };
    let offset = ctx.config.utc_offset();

    header(&format!("Achievements ({}/{})", unlocked.len(), all_achievements().len()));
    let mut category = None;
    for def in all_achievements() {
        if category != Some(def.category) {
            category = Some(def.category);
            println!("  {}", format!("{:?}", def.category).to_lowercase().underline());
        }
        let mark = if unlocked.contains(&def.id) {
            "done".green().to_string()
        } else {
            let fraction = achievement_progress(&def.id, &snapshot, &offset).unwrap_or(0.0);
            format!("{:>3}%", (fraction * 100.0).floor() as u32).dimmed().to_string()
        };
        println!("    {:<6} {:<7} {:<22} {}", mark, def.icon, def.name, def.description.dimmed());
    }
    Ok(())
}

pub fn history(ctx: &Context, count: usize) -> Result<()> {
    let events = ctx.history().read_all()?;
    let recent: Vec<ProgressionEvent> = events.iter().rev().take(count).cloned().collect();

    header(&format!("History (last {} of {})", recent.len(), events.len()));
    print_events(&recent, &ctx.config.utc_offset());

    let summary = summarize(&events);
    if !summary.skill_xp.is_empty() {
        println!();
        for (skill, xp) in &summary.skill_xp {
            print_kv(skill.as_str(), &format!("+{} XP", xp));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelup_core::store::STATE_FILE;
    use levelup_core::ReasonCode;
    use std::fs;
    use tempfile::tempdir;

    fn context(dir: &Path) -> Context {
        Context::load(Some(&dir.join("config.toml")), Some(dir.join("data"))).unwrap()
    }

    fn coding() -> Vec<String> {
        vec!["coding".to_string()]
    }

    #[test]
    fn test_session_persists_state_and_history() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        session(&ctx, &coding(), 7200.0, Some(0), Some(10), None).unwrap();

        let store = ctx.open_store().unwrap();
        assert_eq!(store.state().total_sessions, 1);
        assert_eq!(store.active_days(), vec![ctx.today()]);
        assert!(store.unlocked_ids().unwrap().contains("first_session"));
        assert_eq!(store.state().skill_xp.get(&SkillId::Developer), Some(&8300));

        let events = ctx.history().read_all().unwrap();
        assert_eq!(events[0].reason_code, ReasonCode::SessionComplete);
        assert!(events.iter().any(|e| e.reason_code == ReasonCode::AchievementUnlock));
    }

    #[test]
    fn test_failed_session_is_not_counted() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        session(&ctx, &coding(), 60.0, Some(0), Some(10), None).unwrap();

        // A directory in the temp file's place makes every state write fail
        let blocker = ctx.data_dir.join(STATE_FILE).with_extension("json.tmp");
        fs::create_dir_all(&blocker).unwrap();
        assert!(session(&ctx, &coding(), 60.0, Some(0), Some(10), None).is_err());
        fs::remove_dir_all(&blocker).unwrap();

        let store = ctx.open_store().unwrap();
        assert_eq!(store.state().total_sessions, 1);
    }

    #[test]
    fn test_friends_and_bad_start_hour() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        friends(&ctx, 5).unwrap();
        let store = ctx.open_store().unwrap();
        assert_eq!(store.state().friend_count, 5);
        assert!(store.unlocked_ids().unwrap().contains("five_friends"));

        assert!(session(&ctx, &coding(), 60.0, None, Some(24), None).is_err());
        assert_eq!(ctx.open_store().unwrap().state().total_sessions, 0);
    }
}
