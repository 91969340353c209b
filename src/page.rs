//! The focus page: owns the player and the Pomodoro timer for as long as it
//! is mounted.
//!
//! Every long-lived resource (audio engine, stores, ticker, background tasks)
//! is created in `mount` and torn down in `unmount`, so nothing outlives the
//! page or reaches into shared globals.

use anyhow::{anyhow, Result};
use std::{path::Path, sync::Arc};
use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::{AudioEngineHandle, AudioOutput, Chime, MediaHandle},
    config::AppConfig,
    history::{HistoryStore, JsonHistoryStore},
    playlist::{loader, PlaybackController},
    settings::SettingsStore,
    timer::PomodoroController,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub struct FocusPage<O: AudioOutput + 'static> {
    playback: Arc<Mutex<PlaybackController<O>>>,
    pomodoro: PomodoroController,
    settings: Arc<SettingsStore>,
    cancel: CancellationToken,
}

impl FocusPage<AudioEngineHandle> {
    /// Mounts the page on the rodio engine. Must run inside a tokio runtime.
    pub fn mount(config: AppConfig) -> Result<Self> {
        let engine = AudioEngineHandle::new();
        let track_events = engine
            .take_track_events()
            .ok_or_else(|| anyhow!("audio engine events already taken"))?;
        let chime = config
            .chime_enabled
            .then(|| Arc::new(engine.clone()) as Arc<dyn Chime>);

        Self::mount_with(config, engine, track_events, chime)
    }
}

impl<O: AudioOutput + 'static> FocusPage<O> {
    pub fn mount_with(
        config: AppConfig,
        output: O,
        track_events: UnboundedReceiver<MediaHandle>,
        chime: Option<Arc<dyn Chime>>,
    ) -> Result<Self> {
        let settings = Arc::new(SettingsStore::new(config.settings_path())?);
        let history: Arc<dyn HistoryStore> =
            Arc::new(JsonHistoryStore::new(config.history_path()));

        let pomodoro = PomodoroController::new(settings.current(), history, chime)
            .with_tick_interval(config.tick_interval);
        pomodoro.watch_settings(settings.subscribe());

        let playback = Arc::new(Mutex::new(PlaybackController::new(output)));
        let cancel = CancellationToken::new();
        spawn_track_pump(Arc::clone(&playback), track_events, cancel.clone());

        log_info!(
            "Focus page mounted with data in {}",
            config.data_dir.display()
        );

        Ok(Self {
            playback,
            pomodoro,
            settings,
            cancel,
        })
    }

    pub fn playback(&self) -> &Arc<Mutex<PlaybackController<O>>> {
        &self.playback
    }

    pub fn pomodoro(&self) -> &PomodoroController {
        &self.pomodoro
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Loads the given files as the new playlist; returns how many were readable.
    pub async fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        let items = loader::load_files(paths);
        let count = items.len();
        self.playback.lock().await.load_playlist(items);
        count
    }

    pub async fn load_directory(&self, dir: &Path, max_depth: usize) -> Result<usize> {
        let items = loader::load_directory(dir, max_depth)?;
        let count = items.len();
        self.playback.lock().await.load_playlist(items);
        Ok(count)
    }

    pub async fn unmount(self) {
        self.cancel.cancel();
        self.pomodoro.shutdown();
        self.playback.lock().await.stop();
        log_info!("Focus page unmounted");
    }
}

impl<O: AudioOutput + 'static> Drop for FocusPage<O> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.pomodoro.shutdown();
    }
}

fn spawn_track_pump<O: AudioOutput + 'static>(
    playback: Arc<Mutex<PlaybackController<O>>>,
    mut ended: UnboundedReceiver<MediaHandle>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                handle = ended.recv() => match handle {
                    Some(handle) => playback.lock().await.handle_track_ended(handle),
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }
        log_debug!("Track event pump stopped");
    });
}
