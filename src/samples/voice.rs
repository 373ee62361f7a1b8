// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-pad playback state.
//!
//! A [`PlaybackVoice`] tracks where one pad is within its assigned buffer. All
//! mutation happens on the audio thread; operations on an empty or idle voice
//! are silent no-ops so the callback never has to branch into error handling.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;

/// How a pad responds to trigger and release commands.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Plays once to the end. Release is ignored.
    #[default]
    OneShot,
    /// Loops until released.
    Loop,
    /// Plays while held; stops on release or at the end of the sample.
    Hold,
    /// Each trigger toggles looping playback on or off.
    LoopToggle,
}

impl PlaybackMode {
    /// Whether playback wraps around at the end of the buffer.
    pub fn is_looping(self) -> bool {
        matches!(self, PlaybackMode::Loop | PlaybackMode::LoopToggle)
    }

    /// Whether a release command stops playback in this mode.
    pub fn stops_on_release(self) -> bool {
        matches!(self, PlaybackMode::Hold | PlaybackMode::Loop)
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            PlaybackMode::OneShot => 0,
            PlaybackMode::Loop => 1,
            PlaybackMode::Hold => 2,
            PlaybackMode::LoopToggle => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> PlaybackMode {
        match value {
            1 => PlaybackMode::Loop,
            2 => PlaybackMode::Hold,
            3 => PlaybackMode::LoopToggle,
            _ => PlaybackMode::OneShot,
        }
    }
}

/// Errors from voice state transitions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("voice has no sample assigned")]
    InvalidState,
}

/// The playback state of a single pad.
#[derive(Debug, Clone)]
pub struct PlaybackVoice {
    /// The assigned sample, shared with the cache and other voices.
    buffer: Option<Arc<AudioBuffer>>,
    /// Trigger/release behavior.
    mode: PlaybackMode,
    /// Gain applied to every frame read from this voice (0.0 to 1.0).
    volume: f32,
    /// Whether the voice is currently producing audio.
    is_playing: bool,
    /// Fractional frame offset into the buffer.
    position: f64,
    /// Number of times playback has wrapped around.
    loop_count: u32,
    /// Whether a loop-toggle voice is toggled on.
    toggle_state: bool,
}

impl Default for PlaybackVoice {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackVoice {
    /// Creates an empty voice.
    pub fn new() -> Self {
        Self {
            buffer: None,
            mode: PlaybackMode::OneShot,
            volume: 1.0,
            is_playing: false,
            position: 0.0,
            loop_count: 0,
            toggle_state: false,
        }
    }

    /// Creates a voice with a sample already assigned.
    pub fn with_buffer(buffer: Arc<AudioBuffer>, mode: PlaybackMode, volume: f32) -> Self {
        let mut voice = Self::new();
        voice.assign(buffer, mode, volume);
        voice
    }

    /// Assigns a new sample and resets playback progress. Returns the previously
    /// assigned buffer so the caller decides where it gets dropped.
    pub fn assign(
        &mut self,
        buffer: Arc<AudioBuffer>,
        mode: PlaybackMode,
        volume: f32,
    ) -> Option<Arc<AudioBuffer>> {
        let previous = self.buffer.replace(buffer);
        self.mode = mode;
        self.volume = volume.clamp(0.0, 1.0);
        self.reset();
        previous
    }

    /// Stops playback and removes the assigned sample, returning it.
    pub fn clear(&mut self) -> Option<Arc<AudioBuffer>> {
        self.reset();
        self.buffer.take()
    }

    /// Starts playback from the beginning.
    pub fn start(&mut self) -> Result<(), VoiceError> {
        if self.buffer.is_none() {
            return Err(VoiceError::InvalidState);
        }

        self.is_playing = true;
        self.position = 0.0;
        self.loop_count = 0;
        Ok(())
    }

    /// Flips a loop-toggle voice between playing and stopped. Returns whether the
    /// voice is playing afterwards.
    pub fn toggle(&mut self) -> Result<bool, VoiceError> {
        if self.is_playing {
            self.stop();
            return Ok(false);
        }

        self.start()?;
        self.toggle_state = true;
        Ok(true)
    }

    /// Stops playback without rewinding.
    pub fn stop(&mut self) {
        self.is_playing = false;
        if self.mode == PlaybackMode::LoopToggle {
            self.toggle_state = false;
        }
    }

    /// Stops playback and rewinds to the start.
    pub fn reset(&mut self) {
        self.stop();
        self.toggle_state = false;
        self.position = 0.0;
        self.loop_count = 0;
    }

    /// Moves the playhead forward by `frames`. Looping modes wrap around; the
    /// other modes stop once the end of the buffer is reached.
    pub fn advance(&mut self, frames: usize) {
        if !self.is_playing {
            return;
        }
        let frame_count = match &self.buffer {
            Some(buffer) => buffer.frame_count() as f64,
            None => return,
        };
        if frame_count == 0.0 {
            self.stop();
            return;
        }

        self.position += frames as f64;
        if self.position < frame_count {
            return;
        }

        if self.mode.is_looping() {
            let wraps = (self.position / frame_count).floor();
            self.position %= frame_count;
            self.loop_count = self.loop_count.saturating_add(wraps as u32);
        } else {
            self.stop();
        }
    }

    /// Copies up to `frames` frames starting at the playhead into `output`,
    /// interleaved with the buffer's own channel count and scaled by the voice
    /// volume. The playhead is not moved.
    ///
    /// Looping modes always produce `frames` frames, splicing the tail of the
    /// buffer with its head. Other modes stop at the end of the buffer and may
    /// return fewer. Returns `None` if the voice has nothing to play. The read is
    /// also bounded by the capacity of `output`.
    pub fn read_frames(&self, frames: usize, output: &mut [f32]) -> Option<usize> {
        if !self.is_playing {
            return None;
        }
        let buffer = self.buffer.as_ref()?;
        let frame_count = buffer.frame_count();
        let start = self.position.floor() as usize;
        if start >= frame_count {
            return None;
        }

        let channels = buffer.channel_count() as usize;
        let frames = frames.min(output.len() / channels);
        let samples = buffer.samples();

        let written = if start + frames <= frame_count {
            let len = frames * channels;
            output[..len].copy_from_slice(&samples[start * channels..start * channels + len]);
            frames
        } else if self.mode.is_looping() {
            // Tail of the buffer followed by as many wraps of the head as needed.
            let mut written = 0;
            let mut cursor = start;
            while written < frames {
                let chunk = (frame_count - cursor).min(frames - written);
                output[written * channels..(written + chunk) * channels].copy_from_slice(
                    &samples[cursor * channels..(cursor + chunk) * channels],
                );
                written += chunk;
                cursor = 0;
            }
            written
        } else {
            let tail = frame_count - start;
            output[..tail * channels].copy_from_slice(&samples[start * channels..]);
            tail
        };

        if self.volume != 1.0 {
            for sample in output[..written * channels].iter_mut() {
                *sample *= self.volume;
            }
        }

        Some(written)
    }

    /// Allocating convenience wrapper around [`PlaybackVoice::read_frames`].
    pub fn get_frames(&self, frames: usize) -> Option<Vec<f32>> {
        let channels = self.channel_count() as usize;
        let mut output = vec![0.0; frames * channels];
        let written = self.read_frames(frames, &mut output)?;
        output.truncate(written * channels);
        Some(output)
    }

    /// Sets the voice volume, clamped to 0.0..=1.0.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Changes the playback mode. Leaving loop-toggle mode clears the toggle.
    pub fn set_mode(&mut self, mode: PlaybackMode) {
        if mode != PlaybackMode::LoopToggle {
            self.toggle_state = false;
        }
        self.mode = mode;
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether the voice should be rendered by the mixer.
    pub fn is_active(&self) -> bool {
        self.is_playing && self.buffer.is_some()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn toggle_state(&self) -> bool {
        self.toggle_state
    }

    /// Channel count of the assigned buffer, or 1 when empty.
    pub fn channel_count(&self) -> u16 {
        self.buffer.as_ref().map_or(1, |b| b.channel_count())
    }

    /// Playback progress through the buffer, from 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        match &self.buffer {
            Some(buffer) if buffer.frame_count() > 0 => {
                (self.position / buffer.frame_count() as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Seconds played since the playhead was last at zero.
    pub fn time_elapsed(&self) -> f64 {
        match &self.buffer {
            Some(buffer) => self.position / buffer.sample_rate() as f64,
            None => 0.0,
        }
    }

    /// Seconds until the end of the buffer.
    pub fn time_remaining(&self) -> f64 {
        match &self.buffer {
            Some(buffer) => {
                (buffer.frame_count() as f64 - self.position).max(0.0) / buffer.sample_rate() as f64
            }
            None => 0.0,
        }
    }
}
