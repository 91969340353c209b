use anyhow::{anyhow, Result};
use std::{env, path::PathBuf, time::Duration};

const DATA_DIR_VAR: &str = "FOCUSBEAT_DATA_DIR";
const DEBUG_VAR: &str = "FOCUSBEAT_DEBUG";
const CHIME_VAR: &str = "FOCUSBEAT_CHIME";

const SETTINGS_FILE: &str = "settings.json";
const HISTORY_FILE: &str = "history.json";

/// Where the page keeps its files and how fast its timer runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
    pub chime_enabled: bool,
}

impl AppConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            tick_interval: Duration::from_secs(1),
            chime_enabled: true,
        }
    }

    /// Reads `FOCUSBEAT_DATA_DIR`, `FOCUSBEAT_DEBUG` and `FOCUSBEAT_CHIME`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(DATA_DIR_VAR).filter(|value| !value.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("focusbeat"))
                .ok_or_else(|| anyhow!("could not resolve a data directory; set {DATA_DIR_VAR}"))?,
        };

        let mut config = Self::new(data_dir);
        // Debug mode runs the countdown ten times faster for manual testing.
        if lookup(DEBUG_VAR).map(|v| is_truthy(&v)).unwrap_or(false) {
            config.tick_interval = Duration::from_millis(100);
        }
        if let Some(value) = lookup(CHIME_VAR) {
            config.chime_enabled = is_truthy(&value);
        }
        Ok(config)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
