use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    history::{filter_history, HistoryFilter},
    models::{SessionMode, SessionRecord, TaskRef},
    settings::PomodoroSettings,
};

/// What listeners outside the page are told about the timer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FocusStatus {
    Focus,
    Break,
    Paused,
}

impl FocusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusStatus::Focus => "focus",
            FocusStatus::Break => "break",
            FocusStatus::Paused => "paused",
        }
    }
}

/// Side effects a transition asks the owner to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlayChime,
    PersistHistory(Vec<SessionRecord>),
    SessionCompleted {
        record: SessionRecord,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSnapshot {
    pub mode: SessionMode,
    pub time_left_secs: u32,
    pub is_running: bool,
    pub session_count: u32,
    pub next_break_long: bool,
    pub status: FocusStatus,
    pub settings: PomodoroSettings,
    pub selected_task_id: Option<String>,
    pub history_len: usize,
}

/// The Pomodoro state machine. Pure: it never sleeps, plays sounds or writes
/// files; transitions that need those return [`Effect`]s instead.
#[derive(Debug, Clone)]
pub struct PomodoroState {
    mode: SessionMode,
    time_left_secs: u32,
    is_running: bool,
    session_count: u32,
    next_break_long: bool,
    settings: PomodoroSettings,
    history: Vec<SessionRecord>,
    tasks: Vec<TaskRef>,
    selected_task_id: Option<String>,
}

impl PomodoroState {
    pub fn new(settings: PomodoroSettings, history: Vec<SessionRecord>) -> Self {
        let settings = if settings.validate().is_ok() {
            settings
        } else {
            PomodoroSettings::default()
        };

        Self {
            mode: SessionMode::Focus,
            time_left_secs: settings.duration_secs(SessionMode::Focus),
            is_running: false,
            session_count: 0,
            next_break_long: false,
            settings,
            history,
            tasks: Vec::new(),
            selected_task_id: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn next_break_long(&self) -> bool {
        self.next_break_long
    }

    pub fn settings(&self) -> PomodoroSettings {
        self.settings
    }

    pub fn history(&self) -> &[SessionRecord] {
        &self.history
    }

    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn selected_task_id(&self) -> Option<&str> {
        self.selected_task_id.as_deref()
    }

    pub fn status(&self) -> FocusStatus {
        match (self.is_running, self.mode.is_break()) {
            (false, _) => FocusStatus::Paused,
            (true, false) => FocusStatus::Focus,
            (true, true) => FocusStatus::Break,
        }
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        PomodoroSnapshot {
            mode: self.mode,
            time_left_secs: self.time_left_secs,
            is_running: self.is_running,
            session_count: self.session_count,
            next_break_long: self.next_break_long,
            status: self.status(),
            settings: self.settings,
            selected_task_id: self.selected_task_id.clone(),
            history_len: self.history.len(),
        }
    }

    /// Returns whether the timer was paused before.
    pub fn start(&mut self) -> bool {
        if self.is_running {
            return false;
        }
        self.is_running = true;
        true
    }

    /// Returns whether the timer was running before.
    pub fn pause(&mut self) -> bool {
        if !self.is_running {
            return false;
        }
        self.is_running = false;
        true
    }

    pub fn toggle(&mut self) {
        if self.is_running {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn reset(&mut self) {
        self.is_running = false;
        self.time_left_secs = self.settings.duration_secs(self.mode);
    }

    /// One second elapsed. Reaching zero completes the session.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.is_running {
            return Vec::new();
        }

        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            self.complete_session(now)
        } else {
            Vec::new()
        }
    }

    /// Finishes the current interval: records it, picks the next mode and cues
    /// its full duration without starting.
    pub fn complete_session(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.is_running = false;

        let finished = self.mode;
        let (task_id, task_title) = self.linked_task();
        let record = SessionRecord::new(
            finished,
            self.settings.minutes_for(finished),
            task_id,
            task_title,
            now,
        );
        self.history.push(record.clone());

        self.advance_mode();

        vec![
            Effect::PlayChime,
            Effect::PersistHistory(self.history.clone()),
            Effect::SessionCompleted {
                record,
                message: completion_message(finished, self.mode),
            },
        ]
    }

    /// Moves on to the next interval immediately, without a record or chime.
    /// A skipped focus session still counts toward the long-break interval.
    pub fn skip(&mut self) {
        self.is_running = false;
        self.advance_mode();
    }

    pub fn select_mode(&mut self, mode: SessionMode) {
        self.is_running = false;
        self.mode = mode;
        match mode {
            SessionMode::ShortBreak => self.next_break_long = false,
            SessionMode::LongBreak => self.next_break_long = true,
            SessionMode::Focus => {}
        }
        self.time_left_secs = self.settings.duration_secs(mode);
    }

    /// Takes new durations. A running interval keeps its remaining time.
    pub fn apply_settings(&mut self, settings: PomodoroSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        if !self.is_running {
            self.time_left_secs = settings.duration_secs(self.mode);
        }
        Ok(())
    }

    pub fn set_tasks(&mut self, tasks: Vec<TaskRef>) {
        self.tasks = tasks;
    }

    pub fn select_task(&mut self, task_id: Option<String>) {
        self.selected_task_id = task_id;
    }

    pub fn filter_history(&self, filter: &HistoryFilter) -> Vec<SessionRecord> {
        filter_history(&self.history, filter)
    }

    fn linked_task(&self) -> (Option<String>, Option<String>) {
        let Some(task_id) = self.selected_task_id.as_ref() else {
            return (None, None);
        };
        let title = self
            .tasks
            .iter()
            .find(|task| &task.id == task_id)
            .map(|task| task.title.clone());
        (Some(task_id.clone()), title)
    }

    fn advance_mode(&mut self) {
        if self.mode == SessionMode::Focus {
            self.session_count += 1;
            self.next_break_long = self.session_count % self.settings.long_break_interval == 0;
            self.mode = if self.next_break_long {
                SessionMode::LongBreak
            } else {
                SessionMode::ShortBreak
            };
        } else {
            self.mode = SessionMode::Focus;
        }
        self.time_left_secs = self.settings.duration_secs(self.mode);
    }
}

fn completion_message(finished: SessionMode, next: SessionMode) -> String {
    match (finished, next) {
        (SessionMode::Focus, SessionMode::LongBreak) => {
            "Focus session complete! Time for a long break.".to_string()
        }
        (SessionMode::Focus, _) => "Focus session complete! Time for a short break.".to_string(),
        _ => "Break is over! Ready to focus?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(work: u32, short: u32, long: u32, interval: u32) -> PomodoroState {
        PomodoroState::new(
            PomodoroSettings::new(work, short, long, interval),
            Vec::new(),
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn starts_paused_in_focus_with_full_duration() {
        let state = state(25, 5, 15, 4);
        assert_eq!(state.mode(), SessionMode::Focus);
        assert!(!state.is_running());
        assert_eq!(state.time_left_secs(), 25 * 60);
        assert_eq!(state.status(), FocusStatus::Paused);
    }

    #[test]
    fn invalid_initial_settings_fall_back_to_defaults() {
        let state = state(0, 5, 15, 4);
        assert_eq!(state.settings(), PomodoroSettings::default());
    }

    #[test]
    fn start_then_reset_restores_full_duration() {
        for work in [1, 7, 25, 90] {
            let mut state = state(work, 5, 15, 4);
            assert!(state.start());
            state.tick(now());
            state.tick(now());
            state.reset();

            assert_eq!(state.time_left_secs(), work * 60);
            assert!(!state.is_running());
        }
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let mut state = state(25, 5, 15, 4);
        assert!(state.start());
        assert!(!state.start());
        assert!(state.pause());
        assert!(!state.pause());

        state.toggle();
        assert!(state.is_running());
        state.toggle();
        assert!(!state.is_running());
    }

    #[test]
    fn ticks_only_count_while_running() {
        let mut state = state(25, 5, 15, 4);
        assert!(state.tick(now()).is_empty());
        assert_eq!(state.time_left_secs(), 25 * 60);

        state.start();
        state.tick(now());
        assert_eq!(state.time_left_secs(), 25 * 60 - 1);
        assert_eq!(state.status(), FocusStatus::Focus);
    }

    #[test]
    fn reaching_zero_completes_the_session() {
        let mut state = state(1, 5, 15, 4);
        state.start();
        let mut effects = Vec::new();
        for _ in 0..60 {
            effects = state.tick(now());
        }

        assert_eq!(state.mode(), SessionMode::ShortBreak);
        assert_eq!(state.time_left_secs(), 5 * 60);
        assert!(!state.is_running());
        assert_eq!(effects.len(), 3);
        assert_eq!(effects[0], Effect::PlayChime);
        assert!(matches!(&effects[1], Effect::PersistHistory(records) if records.len() == 1));
    }

    #[test]
    fn long_break_follows_exactly_interval_focus_sessions() {
        for interval in 1..=5 {
            let mut state = state(25, 5, 15, interval);
            for completed in 1..=interval + 1 {
                if state.mode() != SessionMode::Focus {
                    state.complete_session(now());
                }
                state.complete_session(now());
                let expect_long = completed % interval == 0;
                assert_eq!(
                    state.next_break_long(),
                    expect_long,
                    "interval {interval} after {completed} focus sessions"
                );
                assert_eq!(
                    state.mode(),
                    if expect_long {
                        SessionMode::LongBreak
                    } else {
                        SessionMode::ShortBreak
                    }
                );
            }
        }
    }

    #[test]
    fn four_focus_sessions_lead_to_long_break() {
        let mut state = state(25, 5, 15, 4);

        for round in 1..=4 {
            assert_eq!(state.mode(), SessionMode::Focus);
            let effects = state.complete_session(now());
            assert!(effects.contains(&Effect::PlayChime));
            assert_eq!(state.session_count(), round);
            if round < 4 {
                assert_eq!(state.mode(), SessionMode::ShortBreak);
                assert_eq!(state.time_left_secs(), 5 * 60);
                state.complete_session(now());
            }
        }

        assert_eq!(state.session_count(), 4);
        assert_eq!(state.mode(), SessionMode::LongBreak);
        assert_eq!(state.time_left_secs(), 15 * 60);

        let focus_records = state.filter_history(&HistoryFilter::Focus);
        assert_eq!(focus_records.len(), 4);
        assert!(focus_records.iter().all(|r| r.duration_minutes == 25));

        let effects = state.complete_session(now());
        assert_eq!(state.mode(), SessionMode::Focus);
        assert_eq!(state.time_left_secs(), 25 * 60);
        assert_eq!(state.session_count(), 4);
        let last = state.history().last().unwrap();
        assert_eq!(last.mode, SessionMode::LongBreak);
        assert_eq!(last.duration_minutes, 15);
        assert!(matches!(
            effects.last(),
            Some(Effect::SessionCompleted { message, .. }) if message.contains("Ready to focus")
        ));
    }

    #[test]
    fn skip_records_nothing_but_applies_break_rule() {
        let mut skipped = state(25, 5, 15, 2);
        let mut completed = state(25, 5, 15, 2);

        for _ in 0..2 {
            skipped.start();
            skipped.tick(now());
            skipped.skip();
            completed.complete_session(now());

            assert_eq!(skipped.mode(), completed.mode());
            assert_eq!(skipped.session_count(), completed.session_count());
            assert_eq!(skipped.next_break_long(), completed.next_break_long());
            assert!(!skipped.is_running());

            skipped.skip();
            completed.complete_session(now());
        }

        assert!(skipped.history().is_empty());
        assert_eq!(completed.history().len(), 4);
    }

    #[test]
    fn skip_from_break_returns_to_focus() {
        let mut state = state(25, 5, 15, 4);
        state.select_mode(SessionMode::LongBreak);
        state.skip();
        assert_eq!(state.mode(), SessionMode::Focus);
        assert_eq!(state.time_left_secs(), 25 * 60);
        assert_eq!(state.session_count(), 0);
    }

    #[test]
    fn explicit_mode_selection_overrides_progress() {
        let mut state = state(25, 5, 15, 4);
        state.complete_session(now());
        state.start();
        state.tick(now());

        state.select_mode(SessionMode::LongBreak);
        assert_eq!(state.mode(), SessionMode::LongBreak);
        assert_eq!(state.time_left_secs(), 15 * 60);
        assert!(!state.is_running());

        state.select_mode(SessionMode::Focus);
        assert_eq!(state.time_left_secs(), 25 * 60);
        assert_eq!(state.session_count(), 1);
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn settings_change_resets_idle_timer_only() {
        let mut state = state(25, 5, 15, 4);
        state.apply_settings(PomodoroSettings::new(50, 10, 30, 3)).unwrap();
        assert_eq!(state.time_left_secs(), 50 * 60);

        state.start();
        state.tick(now());
        state.apply_settings(PomodoroSettings::new(40, 10, 30, 3)).unwrap();
        assert_eq!(state.time_left_secs(), 50 * 60 - 1);

        state.reset();
        assert_eq!(state.time_left_secs(), 40 * 60);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut state = state(25, 5, 15, 4);
        assert!(state
            .apply_settings(PomodoroSettings::new(25, 0, 15, 4))
            .is_err());
        assert_eq!(state.settings(), PomodoroSettings::new(25, 5, 15, 4));
    }

    #[test]
    fn completed_session_links_selected_task() {
        let mut state = state(25, 5, 15, 4);
        state.set_tasks(vec![TaskRef::new("t1", "Write report")]);
        state.select_task(Some("t1".into()));
        state.complete_session(now());

        state.select_task(Some("gone".into()));
        state.complete_session(now());

        state.select_task(None);
        state.complete_session(now());

        let history = state.history();
        assert_eq!(history[0].linked_task_id.as_deref(), Some("t1"));
        assert_eq!(history[0].linked_task_title.as_deref(), Some("Write report"));
        assert_eq!(history[1].linked_task_id.as_deref(), Some("gone"));
        assert_eq!(history[1].linked_task_title, None);
        assert_eq!(history[2].linked_task_id, None);

        let for_t1 = state.filter_history(&HistoryFilter::Task("t1".into()));
        assert_eq!(for_t1.len(), 1);
    }

    #[test]
    fn status_reflects_mode_and_running() {
        let mut state = state(25, 5, 15, 4);
        state.start();
        assert_eq!(state.status(), FocusStatus::Focus);
        state.select_mode(SessionMode::ShortBreak);
        state.start();
        assert_eq!(state.status(), FocusStatus::Break);
        assert_eq!(state.snapshot().status.as_str(), "break");
    }
}
