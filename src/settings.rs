use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tokio::sync::watch;

use crate::models::SessionMode;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Pomodoro durations in minutes, stored under the names the settings page
/// writes (`workDuration`, `shortBreakDuration`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroSettings {
    #[serde(rename = "workDuration")]
    pub work_minutes: u32,
    #[serde(rename = "shortBreakDuration")]
    pub short_break_minutes: u32,
    #[serde(rename = "longBreakDuration")]
    pub long_break_minutes: u32,
    pub long_break_interval: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 4,
        }
    }
}

impl PomodoroSettings {
    pub fn new(work: u32, short_break: u32, long_break: u32, interval: u32) -> Self {
        Self {
            work_minutes: work,
            short_break_minutes: short_break,
            long_break_minutes: long_break,
            long_break_interval: interval,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.work_minutes == 0 {
            bail!("workDuration must be at least one minute");
        }
        if self.short_break_minutes == 0 {
            bail!("shortBreakDuration must be at least one minute");
        }
        if self.long_break_minutes == 0 {
            bail!("longBreakDuration must be at least one minute");
        }
        if self.long_break_interval == 0 {
            bail!("longBreakInterval must be at least one session");
        }
        Ok(())
    }

    pub fn minutes_for(&self, mode: SessionMode) -> u32 {
        match mode {
            SessionMode::Focus => self.work_minutes,
            SessionMode::ShortBreak => self.short_break_minutes,
            SessionMode::LongBreak => self.long_break_minutes,
        }
    }

    pub fn duration_secs(&self, mode: SessionMode) -> u32 {
        self.minutes_for(mode).saturating_mul(60)
    }
}

/// JSON-file settings with change notification. Subscribers get the new value
/// through a watch channel whenever `update` or `reload` changes it.
pub struct SettingsStore {
    path: PathBuf,
    current: watch::Sender<PomodoroSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            parse_settings(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "Ignoring settings in {}: {err:#}; using defaults",
                    path.display()
                );
                PomodoroSettings::default()
            })
        } else {
            PomodoroSettings::default()
        };

        let (current, _) = watch::channel(data);
        Ok(Self { path, current })
    }

    pub fn current(&self) -> PomodoroSettings {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PomodoroSettings> {
        self.current.subscribe()
    }

    pub fn update(&self, settings: PomodoroSettings) -> Result<()> {
        settings.validate()?;
        self.persist(&settings)?;
        self.publish(settings);
        Ok(())
    }

    /// Re-reads the file, e.g. after another window saved new settings.
    /// Unreadable or invalid contents keep the previous value.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let settings = parse_settings(&contents)?;
        self.publish(settings);
        Ok(())
    }

    fn publish(&self, settings: PomodoroSettings) {
        let changed = self.current.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        });
        if changed {
            log_info!(
                "Settings changed: work {}m, short break {}m, long break {}m, every {} sessions",
                settings.work_minutes,
                settings.short_break_minutes,
                settings.long_break_minutes,
                settings.long_break_interval
            );
        }
    }

    fn persist(&self, data: &PomodoroSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn parse_settings(contents: &str) -> Result<PomodoroSettings> {
    let settings: PomodoroSettings =
        serde_json::from_str(contents).context("settings are not valid JSON")?;
    settings.validate()?;
    Ok(settings)
}
