//! Terminal rendering helpers.

use chrono::{FixedOffset, TimeZone, Utc};
use levelup_core::events::ReasonCode;
use levelup_core::{GrantReport, ProgressionEvent};
use owo_colors::OwoColorize;

pub const HR: &str = "────────────────────────────────────────────────────────";

const KEY_WIDTH: usize = 14;

pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", HR.dimmed());
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {:<width$} {}", key.dimmed(), value, width = KEY_WIDTH);
}

/// Fixed-width bar for a 0.0 - 1.0 fraction
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn format_time(ms: i64, offset: &FixedOffset) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn reason_label(reason: ReasonCode) -> String {
    match reason {
        ReasonCode::FocusTick | ReasonCode::SessionComplete => reason.as_str().cyan().to_string(),
        ReasonCode::AchievementUnlock => reason.as_str().yellow().bold().to_string(),
        ReasonCode::SkillMilestone => reason.as_str().magenta().to_string(),
        ReasonCode::StreakBonus | ReasonCode::RewardClaim => reason.as_str().green().to_string(),
    }
}

pub fn print_event(event: &ProgressionEvent, offset: &FixedOffset) {
    let xp = event.total_skill_xp();
    let xp = if xp > 0 { format!(" +{} XP", xp) } else { String::new() };
    println!(
        "  {} {:<20} {}{}",
        format_time(event.created_at, offset).dimmed(),
        reason_label(event.reason_code),
        event.title,
        xp.green()
    );
    println!("  {:>16} {}", "", event.description.dimmed());
}

pub fn print_events(events: &[ProgressionEvent], offset: &FixedOffset) {
    if events.is_empty() {
        println!("  {}", "nothing new".dimmed());
        return;
    }
    for event in events {
        print_event(event, offset);
    }
}

pub fn print_grants(report: &GrantReport) {
    if report.granted.is_empty() && report.skipped.is_empty() && report.failed.is_empty() {
        return;
    }
    println!();
    for payload in &report.granted {
        println!("  {} {}", "+".green(), payload.label);
    }
    if !report.skipped.is_empty() {
        println!("  {} {} already claimed", "=".dimmed(), report.skipped.len());
    }
    for failed in &report.failed {
        println!("  {} {}: {}", "!".red(), failed.payload.label, failed.error);
    }
    if let Some(err) = &report.load_error {
        println!("  {} claimed rewards unavailable: {}", "!".red(), err);
    }
    if let Some(err) = &report.save_error {
        println!("  {} claimed rewards not saved: {}", "!".red(), err);
    }
}
