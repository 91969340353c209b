use serde::Serialize;
use tokio::sync::watch;

use crate::audio::{AudioOutput, MediaHandle};
use crate::models::AudioItem;

use super::PlaylistState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub track_count: usize,
    pub current_index: Option<usize>,
    pub display_name: Option<String>,
    pub is_playing: bool,
}

impl From<&PlaylistState> for PlaybackSnapshot {
    fn from(state: &PlaylistState) -> Self {
        Self {
            track_count: state.len(),
            current_index: state.current_index(),
            display_name: state.display_name().map(str::to_owned),
            is_playing: state.is_playing(),
        }
    }
}

/// Transport controls for the floating player.
///
/// Manual `next`/`previous` wrap around the list; a track that ends on its own
/// advances only while there is a following item and otherwise stops on the
/// last one. Output failures are logged and leave the player paused rather than
/// surfacing to the caller.
pub struct PlaybackController<O: AudioOutput> {
    state: PlaylistState,
    output: O,
    prepared: Option<MediaHandle>,
    started: bool,
    snapshots: watch::Sender<PlaybackSnapshot>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O) -> Self {
        let (snapshots, _) = watch::channel(PlaybackSnapshot::default());
        Self {
            state: PlaylistState::new(),
            output,
            prepared: None,
            started: false,
            snapshots,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn state(&self) -> &PlaylistState {
        &self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Replaces the playlist and cues the first item without starting it.
    pub fn load_playlist(&mut self, items: Vec<AudioItem>) {
        if items.is_empty() {
            log_debug!("Ignoring empty playlist");
            return;
        }

        self.halt_output();
        self.release_prepared();
        self.state.replace(items);
        self.prepare_current();
        log_info!(
            "Loaded playlist with {} tracks, cued {:?}",
            self.state.len(),
            self.state.display_name()
        );
        self.publish();
    }

    pub fn play_current(&mut self) {
        if self.state.is_empty() {
            return;
        }
        self.start_current();
        self.publish();
    }

    pub fn pause(&mut self) {
        if self.state.is_empty() {
            return;
        }
        if let Err(err) = self.output.pause() {
            log_error!("Failed to pause playback: {err:#}");
        }
        self.state.set_playing(false);
        self.publish();
    }

    pub fn resume(&mut self) {
        if self.state.is_empty() {
            return;
        }
        if self.started {
            match self.output.resume() {
                Ok(()) => self.state.set_playing(true),
                Err(err) => log_error!("Failed to resume playback: {err:#}"),
            }
        } else {
            // Cued but never started, or the last track already ran out.
            self.start_current();
        }
        self.publish();
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing() {
            self.pause();
        } else {
            self.resume();
        }
    }

    /// Full teardown: stops output, releases the cued source and empties the list.
    pub fn stop(&mut self) {
        self.halt_output();
        self.release_prepared();
        self.state.clear();
        self.started = false;
        self.publish();
    }

    pub fn next(&mut self) {
        if self.state.advance().is_some() {
            self.switch_to_current();
        }
    }

    pub fn previous(&mut self) {
        if self.state.retreat().is_some() {
            self.switch_to_current();
        }
    }

    /// Called when `handle` finished playing on its own. Events for sources that
    /// were already replaced are ignored.
    pub fn handle_track_ended(&mut self, handle: MediaHandle) {
        if self.prepared != Some(handle) {
            log_debug!("Ignoring end of stale source {}", handle.id());
            return;
        }

        if self.state.advance_without_wrap().is_some() {
            self.switch_to_current();
        } else {
            self.started = false;
            self.state.set_playing(false);
            self.publish();
        }
    }

    fn switch_to_current(&mut self) {
        self.release_prepared();
        self.prepare_current();
        self.start_current();
        self.publish();
    }

    fn prepare_current(&mut self) -> Option<MediaHandle> {
        let item = self.state.current()?;
        self.started = false;
        match self.output.prepare(item) {
            Ok(handle) => {
                self.prepared = Some(handle);
                Some(handle)
            }
            Err(err) => {
                log_error!("Failed to prepare {}: {err:#}", item.name);
                None
            }
        }
    }

    fn start_current(&mut self) {
        let handle = match self.prepared {
            Some(handle) => Some(handle),
            None => self.prepare_current(),
        };
        let Some(handle) = handle else {
            self.state.set_playing(false);
            return;
        };

        match self.output.start(handle) {
            Ok(()) => {
                self.started = true;
                self.state.set_playing(true);
            }
            Err(err) => {
                log_error!("Failed to start playback: {err:#}");
                self.started = false;
                self.state.set_playing(false);
            }
        }
    }

    fn halt_output(&mut self) {
        if let Err(err) = self.output.halt() {
            log_error!("Failed to halt playback: {err:#}");
        }
    }

    fn release_prepared(&mut self) {
        if let Some(handle) = self.prepared.take() {
            self.output.release(handle);
        }
    }

    fn publish(&self) {
        let next = PlaybackSnapshot::from(&self.state);
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use anyhow::{bail, Result};
    use std::collections::HashMap;

    use super::*;

    /// Records every call and tracks which sources are still alive.
    #[derive(Default)]
    pub(crate) struct FakeOutput {
        next_id: u64,
        pub(crate) live: HashMap<MediaHandle, String>,
        pub(crate) playing: Option<MediaHandle>,
        pub(crate) paused: bool,
        pub(crate) starts: Vec<String>,
        pub(crate) halts: usize,
        pub(crate) fail_prepare: Option<String>,
    }

    impl FakeOutput {
        pub(crate) fn playing_name(&self) -> Option<&str> {
            self.playing
                .and_then(|handle| self.live.get(&handle))
                .map(String::as_str)
        }
    }

    impl AudioOutput for FakeOutput {
        fn prepare(&mut self, item: &AudioItem) -> Result<MediaHandle> {
            if self.fail_prepare.as_deref() == Some(item.name.as_str()) {
                bail!("cannot decode {}", item.name);
            }
            self.next_id += 1;
            let handle = MediaHandle::from_raw(self.next_id);
            self.live.insert(handle, item.name.clone());
            Ok(handle)
        }

        fn release(&mut self, handle: MediaHandle) {
            self.live.remove(&handle);
            if self.playing == Some(handle) {
                self.playing = None;
            }
        }

        fn start(&mut self, handle: MediaHandle) -> Result<()> {
            let Some(name) = self.live.get(&handle) else {
                bail!("source {} was released", handle.id());
            };
            self.starts.push(name.clone());
            self.playing = Some(handle);
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            self.paused = true;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.paused = false;
            Ok(())
        }

        fn halt(&mut self) -> Result<()> {
            self.halts += 1;
            self.playing = None;
            self.paused = false;
            Ok(())
        }
    }
}
