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

//! Per-pad playback state published by the audio thread for polling.
//!
//! At the end of every callback the audio thread copies each voice's state into
//! a set of atomics. Readers never touch the voices themselves. Fields are
//! updated individually, so a reader racing the audio thread may see a mix of
//! two consecutive blocks; this is fine for UI display.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::voice::{PlaybackMode, PlaybackVoice};

/// A snapshot of one pad's playback state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackInfo {
    /// Whether a sample is assigned to the pad.
    pub loaded: bool,
    pub is_playing: bool,
    /// Progress through the sample, 0.0 to 1.0.
    pub progress: f64,
    /// Seconds since the playhead was at the start of the sample.
    pub time_elapsed: f64,
    /// Seconds until the end of the sample.
    pub time_remaining: f64,
    pub mode: PlaybackMode,
    pub volume: f32,
    /// Times a looping pad has wrapped around.
    pub loop_count: u32,
}

#[derive(Default)]
struct PadStatus {
    loaded: AtomicBool,
    playing: AtomicBool,
    /// f64 bits.
    position: AtomicU64,
    frame_count: AtomicU64,
    sample_rate: AtomicU32,
    mode: AtomicU8,
    /// f32 bits.
    volume: AtomicU32,
    loop_count: AtomicU32,
}

/// Published state for every pad.
pub struct StatusBoard {
    pads: Box<[PadStatus]>,
    active: AtomicUsize,
}

impl StatusBoard {
    pub fn new(pad_count: usize) -> Self {
        let pads: Box<[PadStatus]> = (0..pad_count).map(|_| PadStatus::default()).collect();
        for pad in pads.iter() {
            pad.volume.store(1.0f32.to_bits(), Ordering::Relaxed);
        }
        Self {
            pads,
            active: AtomicUsize::new(0),
        }
    }

    /// Copies the state of every voice. Called from the audio thread.
    pub fn publish(&self, voices: &[PlaybackVoice]) {
        let mut active = 0;
        for (status, voice) in self.pads.iter().zip(voices) {
            let playing = voice.is_active();
            if playing {
                active += 1;
            }

            let (frame_count, sample_rate) = voice
                .buffer()
                .map_or((0, 0), |b| (b.frame_count() as u64, b.sample_rate()));
            status.loaded.store(voice.is_loaded(), Ordering::Relaxed);
            status.playing.store(playing, Ordering::Relaxed);
            status
                .position
                .store(voice.position().to_bits(), Ordering::Relaxed);
            status.frame_count.store(frame_count, Ordering::Relaxed);
            status.sample_rate.store(sample_rate, Ordering::Relaxed);
            status.mode.store(voice.mode().to_u8(), Ordering::Relaxed);
            status
                .volume
                .store(voice.volume().to_bits(), Ordering::Relaxed);
            status
                .loop_count
                .store(voice.loop_count(), Ordering::Relaxed);
        }
        self.active.store(active, Ordering::Release);
    }

    pub fn is_playing(&self, pad: usize) -> bool {
        self.pads
            .get(pad)
            .is_some_and(|status| status.playing.load(Ordering::Relaxed))
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn playing_pads(&self) -> Vec<usize> {
        self.pads
            .iter()
            .enumerate()
            .filter(|(_, status)| status.playing.load(Ordering::Relaxed))
            .map(|(pad, _)| pad)
            .collect()
    }

    /// Returns a snapshot for the given pad, or `None` if it is out of range.
    pub fn info(&self, pad: usize) -> Option<PlaybackInfo> {
        let status = self.pads.get(pad)?;
        let loaded = status.loaded.load(Ordering::Relaxed);
        let position = f64::from_bits(status.position.load(Ordering::Relaxed));
        let frame_count = status.frame_count.load(Ordering::Relaxed) as f64;
        let sample_rate = status.sample_rate.load(Ordering::Relaxed) as f64;

        let (progress, time_elapsed, time_remaining) = if loaded && sample_rate > 0.0 {
            let progress = if frame_count > 0.0 {
                (position / frame_count).min(1.0)
            } else {
                0.0
            };
            (
                progress,
                position / sample_rate,
                (frame_count - position).max(0.0) / sample_rate,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Some(PlaybackInfo {
            loaded,
            is_playing: status.playing.load(Ordering::Relaxed),
            progress,
            time_elapsed,
            time_remaining,
            mode: PlaybackMode::from_u8(status.mode.load(Ordering::Relaxed)),
            volume: f32::from_bits(status.volume.load(Ordering::Relaxed)),
            loop_count: status.loop_count.load(Ordering::Relaxed),
        })
    }

    pub fn pad_count(&self) -> usize {
        self.pads.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::AudioBuffer;

    #[test]
    fn test_publish_matches_voice() {
        let buffer = Arc::new(AudioBuffer::from_interleaved(vec![0.0; 400], 2, 100).unwrap());
        let mut voice = PlaybackVoice::with_buffer(buffer, PlaybackMode::Hold, 0.5);
        voice.start().unwrap();
        voice.advance(50);

        let board = StatusBoard::new(2);
        board.publish(&[PlaybackVoice::new(), voice.clone()]);

        assert_eq!(board.active_count(), 1);
        assert_eq!(board.playing_pads(), vec![1]);
        assert!(!board.is_playing(0));
        assert!(!board.is_playing(5));

        let info = board.info(1).unwrap();
        assert!(info.loaded);
        assert!(info.is_playing);
        assert_eq!(info.progress, voice.progress());
        assert_eq!(info.time_elapsed, voice.time_elapsed());
        assert_eq!(info.time_remaining, voice.time_remaining());
        assert_eq!(info.mode, PlaybackMode::Hold);
        assert_eq!(info.volume, 0.5);

        let empty = board.info(0).unwrap();
        assert!(!empty.loaded);
        assert_eq!(empty.progress, 0.0);
        assert_eq!(empty.volume, 1.0);
        assert!(board.info(2).is_none());
    }
}
