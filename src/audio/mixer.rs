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

//! Additive mixing of pad voices into an interleaved output block.

use crate::samples::PlaybackVoice;

/// Number of source channels the scratch buffer is provisioned for up front.
const PREALLOCATED_SOURCE_CHANNELS: usize = 8;

/// Sums playing voices into an output block.
///
/// The mixer owns only scratch space; all playback state lives in the voices.
/// Output is interleaved with `channels` samples per frame.
#[derive(Debug)]
pub struct Mixer {
    /// Number of output channels.
    channels: u16,
    /// Scratch space each voice reads its frames into before remapping.
    scratch: Vec<f32>,
}

impl Mixer {
    /// Creates a mixer for the given output channel count with scratch space for
    /// blocks of up to `max_block_frames` frames.
    pub fn new(channels: u16, max_block_frames: usize) -> Self {
        Self {
            channels: channels.max(1),
            scratch: vec![0.0; max_block_frames * PREALLOCATED_SOURCE_CHANNELS],
        }
    }

    /// Gets the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Mixes every active voice into `output`, which is zeroed first. At most
    /// `output.len() / channels` frames are mixed if `output` is shorter than
    /// `frame_count` frames. Each voice is advanced by the number of frames it
    /// actually contributed.
    pub fn mix(&mut self, voices: &mut [PlaybackVoice], frame_count: usize, output: &mut [f32]) {
        let out_channels = self.channels as usize;
        let frame_count = frame_count.min(output.len() / out_channels);
        let output = &mut output[..frame_count * out_channels];
        output.fill(0.0);

        for voice in voices.iter_mut().filter(|voice| voice.is_active()) {
            let source_channels = voice.channel_count() as usize;
            let needed = frame_count * source_channels;
            if self.scratch.len() < needed {
                // Only reached for blocks or channel counts larger than provisioned.
                self.scratch.resize(needed, 0.0);
            }

            let Some(read) = voice.read_frames(frame_count, &mut self.scratch[..needed]) else {
                // Nothing left to read; lets a zero-length buffer stop.
                voice.advance(0);
                continue;
            };
            let add_length = read.min(frame_count);
            add_remapped(
                &self.scratch[..add_length * source_channels],
                source_channels,
                &mut output[..add_length * out_channels],
                out_channels,
            );
            voice.advance(add_length);
        }
    }

    /// Allocating convenience wrapper around [`Mixer::mix`].
    pub fn mix_to_vec(&mut self, voices: &mut [PlaybackVoice], frame_count: usize) -> Vec<f32> {
        let mut output = vec![0.0; frame_count * self.channels as usize];
        self.mix(voices, frame_count, &mut output);
        output
    }

    /// Multiplies every sample by `volume`.
    pub fn apply_master_volume(buffer: &mut [f32], volume: f32) {
        if volume == 1.0 {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= volume;
        }
    }

    /// Applies a tanh curve to every sample so that sums above full scale
    /// saturate smoothly.
    pub fn soft_clip(buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = sample.tanh();
        }
    }

    /// Clamps every sample to -1.0..=1.0.
    pub fn hard_clip(buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

/// Adds interleaved `source` frames into interleaved `output` frames, adapting
/// the channel layout:
///
/// - equal counts pass through
/// - mono sources are copied to every output channel
/// - mono outputs receive the mean of all source channels
/// - otherwise the first `min(source, output)` channels are copied and the rest
///   are dropped (or left silent)
pub fn add_remapped(
    source: &[f32],
    source_channels: usize,
    output: &mut [f32],
    output_channels: usize,
) {
    if source_channels == output_channels {
        for (out, sample) in output.iter_mut().zip(source) {
            *out += sample;
        }
    } else if source_channels == 1 {
        for (out_frame, sample) in output.chunks_exact_mut(output_channels).zip(source) {
            for out in out_frame {
                *out += sample;
            }
        }
    } else if output_channels == 1 {
        let scale = 1.0 / source_channels as f32;
        for (out, frame) in output.iter_mut().zip(source.chunks_exact(source_channels)) {
            *out += frame.iter().sum::<f32>() * scale;
        }
    } else {
        let source_frames = source.chunks_exact(source_channels);
        for (out_frame, frame) in output.chunks_exact_mut(output_channels).zip(source_frames) {
            for (out, sample) in out_frame.iter_mut().zip(frame) {
                *out += sample;
            }
        }
    }
}
