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
use serde::Deserialize;

/// Default number of pads (an 8x8 grid).
pub const DEFAULT_PAD_COUNT: usize = 64;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_BLOCK_SIZE: usize = 512;
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_NORMALIZE_PEAK: f32 = 0.95;

/// A YAML representation of the engine settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// The number of pads (and therefore voices).
    pad_count: Option<usize>,

    /// The output sample rate. Samples are resampled to this rate when loaded.
    sample_rate: Option<u32>,

    /// The number of output channels.
    channels: Option<u16>,

    /// The largest block the engine provisions mixing space for up front.
    block_size: Option<usize>,

    /// Maximum number of queued commands before new ones are dropped.
    command_queue_capacity: Option<usize>,

    /// Maximum number of undelivered playback events before new ones are dropped.
    event_queue_capacity: Option<usize>,

    /// Initial master volume (0.0 to 1.0).
    master_volume: Option<f32>,

    /// Whether samples are peak-normalized when loaded.
    normalize: Option<bool>,

    /// The peak level samples are normalized to.
    normalize_peak: Option<f32>,
}

impl Engine {
    /// Creates an engine configuration with the given core sizing and defaults
    /// for everything else.
    pub fn new(pad_count: usize, sample_rate: u32, channels: u16) -> Engine {
        Engine {
            pad_count: Some(pad_count),
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            ..Default::default()
        }
    }

    /// Sets the command queue capacity.
    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Engine {
        self.command_queue_capacity = Some(capacity);
        self
    }

    /// Sets the event queue capacity.
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Engine {
        self.event_queue_capacity = Some(capacity);
        self
    }

    /// Sets the provisioned block size.
    pub fn with_block_size(mut self, block_size: usize) -> Engine {
        self.block_size = Some(block_size);
        self
    }

    /// Returns the number of pads (default: 64).
    pub fn pad_count(&self) -> usize {
        self.pad_count.unwrap_or(DEFAULT_PAD_COUNT)
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of output channels (default: 2).
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS).max(1)
    }

    /// Returns the provisioned block size in frames (default: 512).
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1)
    }

    /// Returns the command queue capacity (default: 256).
    pub fn command_queue_capacity(&self) -> usize {
        self.command_queue_capacity
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
            .max(1)
    }

    /// Returns the event queue capacity (default: 256).
    pub fn event_queue_capacity(&self) -> usize {
        self.event_queue_capacity
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
            .max(1)
    }

    /// Returns the initial master volume (default: 1.0).
    pub fn master_volume(&self) -> f32 {
        self.master_volume.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Returns whether samples are normalized on load (default: true).
    pub fn normalize(&self) -> bool {
        self.normalize.unwrap_or(true)
    }

    /// Returns the normalization target peak, limited to (0, 1] (default: 0.95).
    /// Values that are not positive and finite fall back to the default.
    pub fn normalize_peak(&self) -> f32 {
        match self.normalize_peak {
            Some(peak) if peak.is_finite() && peak > 0.0 => peak.min(1.0),
            _ => DEFAULT_NORMALIZE_PEAK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_peak(peak: f32) -> Engine {
        Engine {
            normalize_peak: Some(peak),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_peak() {
        assert_eq!(Engine::default().normalize_peak(), DEFAULT_NORMALIZE_PEAK);
        assert_eq!(with_peak(0.5).normalize_peak(), 0.5);
        assert_eq!(with_peak(1.0).normalize_peak(), 1.0);
        assert_eq!(with_peak(2.0).normalize_peak(), 1.0);
        assert_eq!(with_peak(0.0).normalize_peak(), DEFAULT_NORMALIZE_PEAK);
        assert_eq!(with_peak(-0.5).normalize_peak(), DEFAULT_NORMALIZE_PEAK);
        assert_eq!(with_peak(f32::NAN).normalize_peak(), DEFAULT_NORMALIZE_PEAK);
        assert_eq!(with_peak(f32::INFINITY).normalize_peak(), DEFAULT_NORMALIZE_PEAK);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let engine = Engine::new(4, 48000, 2)
            .with_command_queue_capacity(0)
            .with_event_queue_capacity(0);
        assert_eq!(engine.command_queue_capacity(), 1);
        assert_eq!(engine.event_queue_capacity(), 1);
        assert_eq!(Engine::default().command_queue_capacity(), DEFAULT_QUEUE_CAPACITY);
    }
}
