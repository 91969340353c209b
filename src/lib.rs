//! State behind the focus page: a Pomodoro session controller with persisted
//! history and task linking, and a floating playlist player fed from audio
//! files on disk.

pub mod audio;
pub mod config;
pub mod history;
pub mod models;
pub mod page;
pub mod playlist;
pub mod settings;
pub mod timer;
mod utils;

pub use audio::{AudioEngineHandle, AudioOutput, Chime, MediaHandle};
pub use config::AppConfig;
pub use history::{DailySummary, HistoryFilter, HistoryStore, JsonHistoryStore};
pub use models::{AudioItem, SessionMode, SessionRecord, TaskRef};
pub use page::FocusPage;
pub use playlist::{PlaybackController, PlaybackSnapshot, PlaylistState};
pub use settings::{PomodoroSettings, SettingsStore};
pub use timer::{FocusStatus, PomodoroController, PomodoroEvent, PomodoroSnapshot, PomodoroState};

/// Installs the `env_logger` backend (reads `RUST_LOG`, defaults to `info`).
pub fn init_logging() {
    utils::logging::init();
    log::info!("focusbeat logging initialised");
}
