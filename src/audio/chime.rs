use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Two-note notification tone with an exponential decay on each note.
pub struct ChimeTone {
    notes: [f32; 2],
    note_samples: usize,
    num_sample: usize,
}

impl ChimeTone {
    pub fn new() -> Self {
        Self::with_notes(880.0, 1320.0, Duration::from_millis(300))
    }

    pub fn with_notes(first: f32, second: f32, note_length: Duration) -> Self {
        Self {
            notes: [first, second],
            note_samples: (note_length.as_secs_f32() * SAMPLE_RATE as f32) as usize,
            num_sample: 0,
        }
    }

    fn total_samples(&self) -> usize {
        self.note_samples * self.notes.len()
    }
}

impl Default for ChimeTone {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ChimeTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.note_samples == 0 || self.num_sample >= self.total_samples() {
            return None;
        }

        let note = self.notes[self.num_sample / self.note_samples];
        let offset = (self.num_sample % self.note_samples) as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        let envelope = (-6.0 * offset).exp();
        Some((2.0 * PI * note * offset).sin() * envelope * 0.25)
    }
}

impl Source for ChimeTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples().saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples() as f32 / SAMPLE_RATE as f32,
        ))
    }
}
