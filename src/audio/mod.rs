pub mod chime;

use chime::ChimeTone;

use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::models::AudioItem;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

// How often the engine thread checks whether the current track ran out.
const END_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A playable source created from an [`AudioItem`]. It stays valid until it is
/// passed to [`AudioOutput::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(u64);

impl MediaHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The playback surface the playlist controller drives.
pub trait AudioOutput: Send {
    /// Turns an item into a playable source without starting it.
    fn prepare(&mut self, item: &AudioItem) -> Result<MediaHandle>;
    /// Drops a prepared source. Releasing an unknown handle is a no-op.
    fn release(&mut self, handle: MediaHandle);
    /// Plays `handle` from the beginning, replacing whatever was playing.
    fn start(&mut self, handle: MediaHandle) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Stops playback and rewinds; the next `start` begins at zero.
    fn halt(&mut self) -> Result<()>;
}

/// Short notification sound played when a Pomodoro interval completes.
pub trait Chime: Send + Sync {
    fn play(&self) -> Result<()>;
}

enum AudioCommand {
    Prepare { handle: MediaHandle, data: Arc<[u8]> },
    Release(MediaHandle),
    Start(MediaHandle),
    Pause,
    Resume,
    Halt,
    Chime,
}

/// rodio-backed output. The output stream is not `Send`, so it lives on a
/// dedicated thread that receives commands over a channel; natural
/// end-of-track is reported back through [`AudioEngineHandle::take_track_events`].
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    next_handle: Arc<AtomicU64>,
    ended_tx: UnboundedSender<MediaHandle>,
    ended_rx: Arc<Mutex<Option<UnboundedReceiver<MediaHandle>>>>,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        let (ended_tx, ended_rx) = unbounded_channel();
        Self {
            tx: Arc::new(Mutex::new(None)),
            next_handle: Arc::new(AtomicU64::new(1)),
            ended_tx,
            ended_rx: Arc::new(Mutex::new(Some(ended_rx))),
        }
    }

    /// Receiver of handles whose playback finished on its own. Can be taken once.
    pub fn take_track_events(&self) -> Option<UnboundedReceiver<MediaHandle>> {
        self.ended_rx.lock().ok()?.take()
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio engine lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let ended_tx = self.ended_tx.clone();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || run_engine(rx, ended_tx))
            .context("failed to spawn audio engine thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, command: AudioCommand) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(command)
            .map_err(|_| anyhow!("audio engine thread has exited"))
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for AudioEngineHandle {
    fn prepare(&mut self, item: &AudioItem) -> Result<MediaHandle> {
        // Open the decoder here so a bad file fails the caller instead of
        // being discovered silently on the engine thread.
        Decoder::new(Cursor::new(item.data()))
            .with_context(|| format!("{} is not a playable audio file", item.name))?;

        let handle = MediaHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.send(AudioCommand::Prepare {
            handle,
            data: item.data(),
        })?;
        Ok(handle)
    }

    fn release(&mut self, handle: MediaHandle) {
        // Nothing to release if the engine never started.
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Release(handle));
        }
    }

    fn start(&mut self, handle: MediaHandle) -> Result<()> {
        self.send(AudioCommand::Start(handle))
    }

    fn pause(&mut self) -> Result<()> {
        self.send(AudioCommand::Pause)
    }

    fn resume(&mut self) -> Result<()> {
        self.send(AudioCommand::Resume)
    }

    fn halt(&mut self) -> Result<()> {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Halt);
        }
        Ok(())
    }
}

impl Chime for AudioEngineHandle {
    fn play(&self) -> Result<()> {
        self.send(AudioCommand::Chime)
    }
}

fn ensure_output(
    output: &mut Option<(OutputStream, OutputStreamHandle)>,
) -> Result<&OutputStreamHandle> {
    if output.is_none() {
        let opened = OutputStream::try_default().context("Failed to create audio output stream")?;
        *output = Some(opened);
    }
    output
        .as_ref()
        .map(|(_, handle)| handle)
        .ok_or_else(|| anyhow!("audio output unavailable"))
}

fn start_track(output: &OutputStreamHandle, data: Arc<[u8]>) -> Result<Sink> {
    let decoder = Decoder::new(Cursor::new(data)).context("Failed to decode audio source")?;
    let sink = Sink::try_new(output).context("Failed to create audio sink")?;
    sink.append(decoder);
    sink.play();
    Ok(sink)
}

fn play_chime(output: &OutputStreamHandle) -> Result<()> {
    let sink = Sink::try_new(output).context("Failed to create chime sink")?;
    sink.append(ChimeTone::new());
    sink.detach();
    Ok(())
}

fn run_engine(rx: mpsc::Receiver<AudioCommand>, ended_tx: UnboundedSender<MediaHandle>) {
    let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
    let mut sources: HashMap<MediaHandle, Arc<[u8]>> = HashMap::new();
    let mut track: Option<(MediaHandle, Sink)> = None;

    loop {
        match rx.recv_timeout(END_POLL_INTERVAL) {
            Ok(AudioCommand::Prepare { handle, data }) => {
                sources.insert(handle, data);
            }
            Ok(AudioCommand::Release(handle)) => {
                sources.remove(&handle);
                if matches!(&track, Some((current, _)) if *current == handle) {
                    if let Some((_, sink)) = track.take() {
                        sink.stop();
                    }
                }
            }
            Ok(AudioCommand::Start(handle)) => {
                if let Some((_, old)) = track.take() {
                    old.stop();
                }
                let Some(data) = sources.get(&handle).cloned() else {
                    log_warn!("Ignoring start for released source {}", handle.id());
                    continue;
                };
                match ensure_output(&mut output).and_then(|out| start_track(out, data)) {
                    Ok(sink) => track = Some((handle, sink)),
                    Err(err) => log_error!("Failed to start source {}: {err:#}", handle.id()),
                }
            }
            Ok(AudioCommand::Pause) => {
                if let Some((_, sink)) = &track {
                    sink.pause();
                }
            }
            Ok(AudioCommand::Resume) => {
                if let Some((_, sink)) = &track {
                    sink.play();
                }
            }
            Ok(AudioCommand::Halt) => {
                if let Some((_, sink)) = track.take() {
                    sink.stop();
                }
            }
            Ok(AudioCommand::Chime) => {
                if let Err(err) = ensure_output(&mut output).and_then(play_chime) {
                    log_error!("Failed to play chime: {err:#}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let finished = matches!(&track, Some((_, sink)) if sink.empty() && !sink.is_paused());
        if finished {
            if let Some((handle, _)) = track.take() {
                log_debug!("Source {} reached its end", handle.id());
                let _ = ended_tx.send(handle);
            }
        }
    }

    log_debug!("Audio engine thread shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_rejects_undecodable_bytes() {
        let mut engine = AudioEngineHandle::new();
        let item = AudioItem::new("notes.txt", b"definitely not audio".to_vec());
        assert!(engine.prepare(&item).is_err());
    }

    #[test]
    fn track_events_can_only_be_taken_once() {
        let engine = AudioEngineHandle::new();
        assert!(engine.take_track_events().is_some());
        assert!(engine.clone().take_track_events().is_none());
    }

    #[test]
    fn halt_and_release_before_first_use_are_noops() {
        let mut engine = AudioEngineHandle::new();
        engine.release(MediaHandle::from_raw(7));
        assert!(engine.halt().is_ok());
    }
}
