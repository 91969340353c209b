//! Completed-session history: persistence and read-side queries.
//!
//! The whole list is stored as one JSON array and rewritten in full after each
//! completed session. Reading never fails: a missing, unreadable or malformed
//! file is treated as an empty history.

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::models::{SessionMode, SessionRecord};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Vec<SessionRecord>;
    fn save(&self, records: &[SessionRecord]) -> Result<()>;
}

pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Vec<SessionRecord> {
        if !self.path.exists() {
            return Vec::new();
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => parse_history(&contents),
            Err(err) => {
                log_warn!(
                    "Failed to read session history from {}: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    fn save(&self, records: &[SessionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, serialized).with_context(|| {
            format!("Failed to write session history to {}", self.path.display())
        })?;
        log_debug!("Saved {} session records", records.len());
        Ok(())
    }
}

/// Parses a persisted history list. Legacy `break` tags come back as
/// `short_break`. Entries that are not valid records are dropped one by one;
/// anything that is not a list yields an empty history.
pub fn parse_history(contents: &str) -> Vec<SessionRecord> {
    let entries = match serde_json::from_str::<Vec<Value>>(contents) {
        Ok(entries) => entries,
        Err(err) => {
            log_warn!("Discarding malformed session history: {err}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                log_warn!("Skipping history entry {position}: {err}");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFilter {
    All,
    Focus,
    Breaks,
    Task(String),
}

impl HistoryFilter {
    pub fn matches(&self, record: &SessionRecord) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Focus => record.mode == SessionMode::Focus,
            HistoryFilter::Breaks => record.mode.is_break(),
            HistoryFilter::Task(task_id) => record.linked_task_id.as_deref() == Some(task_id),
        }
    }
}

pub fn filter_history(records: &[SessionRecord], filter: &HistoryFilter) -> Vec<SessionRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub focus_sessions: u32,
    pub focus_minutes: u32,
    pub break_sessions: u32,
}

/// Totals for one calendar day as seen from `tz`.
pub fn summarize_day<Tz: TimeZone>(
    records: &[SessionRecord],
    day: NaiveDate,
    tz: &Tz,
) -> DailySummary {
    records
        .iter()
        .filter(|record| record.timestamp.with_timezone(tz).date_naive() == day)
        .fold(DailySummary::default(), |mut summary, record| {
            if record.mode == SessionMode::Focus {
                summary.focus_sessions += 1;
                summary.focus_minutes += record.duration_minutes;
            } else {
                summary.break_sessions += 1;
            }
            summary
        })
}
