//! Event history.
//!
//! Append-only, bounded to the most recent N events. Events are never
//! removed individually; the oldest fall off once the limit is passed.
//! `JsonlHistory` persists one event per line.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::events::{ProgressionEvent, ReasonCode};
use crate::skills::SkillId;

/// History file name inside the data directory
pub const HISTORY_FILE: &str = "history.jsonl";

/// In-memory bounded history
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<ProgressionEvent>,
    limit: usize,
}

impl EventHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn append(&mut self, event: ProgressionEvent) {
        self.events.push_back(event);
        while self.events.len() > self.limit {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Newest first
    pub fn recent(&self, n: usize) -> Vec<&ProgressionEvent> {
        self.events.iter().rev().take(n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgressionEvent> {
        self.events.iter()
    }
}

/// Totals across a set of events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub skill_xp: BTreeMap<SkillId, u64>,
    pub by_reason: BTreeMap<&'static str, usize>,
    /// Legacy global XP found in old events
    pub global_xp: i64,
}

pub fn summarize<'a, I>(events: I) -> HistorySummary
where
    I: IntoIterator<Item = &'a ProgressionEvent>,
{
    let mut summary = HistorySummary::default();
    for event in events {
        for (skill, xp) in &event.skill_xp_delta {
            *summary.skill_xp.entry(*skill).or_insert(0) += xp;
        }
        *summary.by_reason.entry(event.reason_code.as_str()).or_insert(0) += 1;
        summary.global_xp += event.global_xp_delta;
    }
    summary
}

/// Count of events with a given reason
pub fn count_reason<'a, I>(events: I, reason: ReasonCode) -> usize
where
    I: IntoIterator<Item = &'a ProgressionEvent>,
{
    events.into_iter().filter(|e| e.reason_code == reason).count()
}

/// JSONL-backed history with a line limit
pub struct JsonlHistory {
    path: PathBuf,
    limit: usize,
}

impl JsonlHistory {
    pub fn new(path: impl AsRef<Path>, limit: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            limit: limit.max(1),
        }
    }

    pub fn in_dir(data_dir: &Path, limit: usize) -> Self {
        Self::new(data_dir.join(HISTORY_FILE), limit)
    }

    pub fn append(&self, event: &ProgressionEvent) -> std::io::Result<()> {
        self.append_all(std::slice::from_ref(event))
    }

    pub fn append_all(&self, events: &[ProgressionEvent]) -> std::io::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        {
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            for event in events {
                let line = serde_json::to_string(event)?;
                writeln!(file, "{}", line)?;
            }
        }

        self.trim()
    }

    /// All stored events, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> std::io::Result<Vec<ProgressionEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = i + 1, "skipping malformed history line: {}", e),
            }
        }
        Ok(events)
    }

    /// Load into a bounded in-memory history
    pub fn load(&self) -> std::io::Result<EventHistory> {
        let mut history = EventHistory::new(self.limit);
        for event in self.read_all()? {
            history.append(event);
        }
        Ok(history)
    }

    fn trim(&self) -> std::io::Result<()> {
        let events = self.read_all()?;
        if events.len() <= self.limit {
            return Ok(());
        }

        let keep = &events[events.len() - self.limit..];
        let temp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&temp_path)?;
            for event in keep {
                writeln!(file, "{}", serde_json::to_string(event)?)?;
            }
        }
        fs::rename(&temp_path, &self.path)
    }
}
