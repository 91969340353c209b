use std::{sync::Arc, time::Duration};

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::Chime,
    history::{summarize_day, DailySummary, HistoryFilter, HistoryStore},
    models::{SessionMode, SessionRecord, TaskRef},
    settings::PomodoroSettings,
};

use super::{state::Effect, FocusStatus, PomodoroSnapshot, PomodoroState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 32;

/// Broadcast to anything outside the page that follows the timer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PomodoroEvent {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        status: FocusStatus,
        mode: SessionMode,
    },
    #[serde(rename_all = "camelCase")]
    SessionCompleted {
        record: SessionRecord,
        message: String,
    },
}

/// Timer state plus the token of the ticker driving it. Both sit behind one
/// lock so a running session always has exactly one live ticker.
struct Session {
    state: PomodoroState,
    ticker: Option<CancellationToken>,
}

/// Drives a [`PomodoroState`] with a one-second ticker and carries out the
/// effects of its transitions: chime, history persistence and events.
#[derive(Clone)]
pub struct PomodoroController {
    session: Arc<Mutex<Session>>,
    history_store: Arc<dyn HistoryStore>,
    chime: Option<Arc<dyn Chime>>,
    events: broadcast::Sender<PomodoroEvent>,
    snapshots: Arc<watch::Sender<PomodoroSnapshot>>,
    tick_interval: Duration,
    shutdown: CancellationToken,
}

impl PomodoroController {
    pub fn new(
        settings: PomodoroSettings,
        history_store: Arc<dyn HistoryStore>,
        chime: Option<Arc<dyn Chime>>,
    ) -> Self {
        let history = history_store.load();
        log_info!("Loaded {} completed sessions", history.len());

        let state = PomodoroState::new(settings, history);
        let (snapshots, _) = watch::channel(state.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            session: Arc::new(Mutex::new(Session {
                state,
                ticker: None,
            })),
            history_store,
            chime,
            events,
            snapshots: Arc::new(snapshots),
            tick_interval: Duration::from_secs(1),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PomodoroSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PomodoroEvent> {
        self.events.subscribe()
    }

    pub async fn start(&self) {
        let mut session = self.session.lock().await;
        if self.shutdown.is_cancelled() {
            log_warn!("Ignoring start after shutdown");
            return;
        }
        if session.state.start() {
            self.settle(&mut session, Vec::new());
        }
    }

    pub async fn pause(&self) {
        let mut session = self.session.lock().await;
        if session.state.pause() {
            self.settle(&mut session, Vec::new());
        }
    }

    pub async fn toggle(&self) {
        let mut session = self.session.lock().await;
        if !session.state.is_running() && self.shutdown.is_cancelled() {
            log_warn!("Ignoring start after shutdown");
            return;
        }
        session.state.toggle();
        self.settle(&mut session, Vec::new());
    }

    pub async fn reset(&self) {
        self.transition(PomodoroState::reset).await;
    }

    pub async fn skip(&self) {
        self.transition(PomodoroState::skip).await;
    }

    pub async fn select_mode(&self, mode: SessionMode) {
        self.transition(|state| state.select_mode(mode)).await;
    }

    pub async fn select_focus(&self) {
        self.select_mode(SessionMode::Focus).await;
    }

    pub async fn select_short_break(&self) {
        self.select_mode(SessionMode::ShortBreak).await;
    }

    pub async fn select_long_break(&self) {
        self.select_mode(SessionMode::LongBreak).await;
    }

    /// Ends the current interval now, with the same effects as the countdown
    /// reaching zero.
    pub async fn complete_session(&self) {
        let mut session = self.session.lock().await;
        let effects = session.state.complete_session(Utc::now());
        self.settle(&mut session, effects);
    }

    pub async fn apply_settings(&self, settings: PomodoroSettings) {
        let mut session = self.session.lock().await;
        if let Err(err) = session.state.apply_settings(settings) {
            log_warn!("Keeping previous timer settings: {err:#}");
            return;
        }
        self.settle(&mut session, Vec::new());
    }

    pub async fn set_tasks(&self, tasks: Vec<TaskRef>) {
        self.session.lock().await.state.set_tasks(tasks);
    }

    pub async fn select_task(&self, task_id: Option<String>) {
        let mut session = self.session.lock().await;
        session.state.select_task(task_id);
        self.settle(&mut session, Vec::new());
    }

    pub async fn tasks(&self) -> Vec<TaskRef> {
        self.session.lock().await.state.tasks().to_vec()
    }

    pub async fn history(&self) -> Vec<SessionRecord> {
        self.session.lock().await.state.history().to_vec()
    }

    pub async fn filter_history(&self, filter: HistoryFilter) -> Vec<SessionRecord> {
        self.session.lock().await.state.filter_history(&filter)
    }

    pub async fn today_summary(&self) -> DailySummary {
        let session = self.session.lock().await;
        summarize_day(session.state.history(), Local::now().date_naive(), &Local)
    }

    /// Applies every settings change published on `settings` until shutdown.
    pub fn watch_settings(
        &self,
        mut settings: watch::Receiver<PomodoroSettings>,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = settings.changed() => {
                        if changed.is_err() {
                            log_debug!("Settings source closed");
                            break;
                        }
                        let next = *settings.borrow_and_update();
                        controller.apply_settings(next).await;
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    /// Stops the ticker and any settings watcher. A running session is paused
    /// by its ticker on the way out; later `start` calls are ignored.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            log_info!("Pomodoro controller shutting down");
        }
        self.shutdown.cancel();
    }

    async fn transition<F>(&self, apply: F)
    where
        F: FnOnce(&mut PomodoroState),
    {
        let mut session = self.session.lock().await;
        apply(&mut session.state);
        self.settle(&mut session, Vec::new());
    }

    /// Brings the ticker in line with the running flag, then publishes and
    /// executes effects. Called with the session lock held so concurrent
    /// commands are applied in lock order.
    fn settle(&self, session: &mut Session, effects: Vec<Effect>) {
        if session.state.is_running() {
            let live = session
                .ticker
                .as_ref()
                .is_some_and(|token| !token.is_cancelled());
            if !live {
                let cancel = self.shutdown.child_token();
                let controller = self.clone();
                let token = cancel.clone();
                tokio::spawn(async move { controller.run_ticker(token).await });
                if let Some(stale) = session.ticker.replace(cancel) {
                    stale.cancel();
                }
            }
        } else if let Some(cancel) = session.ticker.take() {
            cancel.cancel();
        }

        self.publish(session.state.snapshot());
        self.run_effects(effects);
    }

    async fn run_ticker(self, cancel: CancellationToken) {
        let mut interval = time::interval_at(
            time::Instant::now() + self.tick_interval,
            self.tick_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let mut session = self.session.lock().await;
                    if cancel.is_cancelled() || !session.state.is_running() {
                        break;
                    }
                    let effects = session.state.tick(Utc::now());
                    self.settle(&mut session, effects);
                    if !session.state.is_running() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    log_debug!("Pomodoro ticker cancelled");
                    break;
                }
            }
        }

        if self.shutdown.is_cancelled() {
            self.halt_after_shutdown().await;
        }
    }

    async fn halt_after_shutdown(&self) {
        let mut session = self.session.lock().await;
        if session.state.pause() {
            log_debug!("Paused running session on shutdown");
            self.settle(&mut session, Vec::new());
        }
    }

    fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PlayChime => {
                    if let Some(chime) = &self.chime {
                        if let Err(err) = chime.play() {
                            log_error!("Failed to play completion chime: {err:#}");
                        }
                    }
                }
                Effect::PersistHistory(records) => {
                    if let Err(err) = self.history_store.save(&records) {
                        log_error!("Failed to persist session history: {err:#}");
                    }
                }
                Effect::SessionCompleted { record, message } => {
                    log_info!("{} session completed: {message}", record.mode.label());
                    let _ = self
                        .events
                        .send(PomodoroEvent::SessionCompleted { record, message });
                }
            }
        }
    }

    fn publish(&self, snapshot: PomodoroSnapshot) {
        let status = snapshot.status;
        let mode = snapshot.mode;
        let previous = self.snapshots.send_replace(snapshot);

        if previous.status != status || previous.mode != mode {
            log_debug!("Timer status is now {} ({})", status.as_str(), mode.as_str());
            let _ = self.events.send(PomodoroEvent::StatusChanged { status, mode });
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;

    use crate::audio::Chime;

    #[derive(Default)]
    pub(crate) struct CountingChime {
        plays: AtomicUsize,
    }

    impl CountingChime {
        pub(crate) fn plays(&self) -> usize {
            self.plays.load(Ordering::SeqCst)
        }
    }

    impl Chime for CountingChime {
        fn play(&self) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
