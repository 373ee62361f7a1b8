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

//! Decoded, in-memory sample data shared between the cache and playing voices.

use std::borrow::Cow;
use std::time::Duration;

/// Errors produced while constructing an [`AudioBuffer`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("channel count must be greater than zero")]
    ZeroChannels,

    #[error("frame {frame} has {found} channels, expected {expected}")]
    RaggedFrame {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("{samples} samples is not a whole number of {channels}-channel frames")]
    PartialFrame { samples: usize, channels: u16 },

    #[error("buffer has {0} channels, at most {max} are supported", max = u16::MAX)]
    TooManyChannels(usize),
}

/// The shape of raw sample data handed to [`AudioBuffer::from_samples`].
#[derive(Debug, Clone)]
pub enum SampleData<S> {
    /// A single channel, one sample per frame.
    Mono(Vec<S>),
    /// Frames-major multi-channel data: each inner vector is one frame holding
    /// one sample per channel.
    Frames(Vec<Vec<S>>),
}

/// An immutable block of decoded PCM audio.
///
/// Samples are stored as interleaved `f32`. Once wrapped in an `Arc` and handed
/// to the engine the buffer is never written again; the only mutation is the
/// normalization pass applied at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples.
    samples: Vec<f32>,
    /// Sample rate in Hz.
    sample_rate: u32,
    /// Number of interleaved channels.
    channel_count: u16,
    /// Number of samples per channel.
    frame_count: usize,
}

impl AudioBuffer {
    /// Builds a buffer from mono or frames-major multi-channel data, converting
    /// each sample to `f32`.
    pub fn from_samples<S>(data: SampleData<S>, sample_rate: u32) -> Result<Self, BufferError>
    where
        S: cpal::Sample,
        f32: cpal::FromSample<S>,
    {
        match data {
            SampleData::Mono(samples) => {
                let samples = samples
                    .into_iter()
                    .map(<f32 as cpal::Sample>::from_sample)
                    .collect();
                Self::from_interleaved(samples, 1, sample_rate)
            }
            SampleData::Frames(frames) => {
                let channels = frames.first().map(Vec::len).unwrap_or(1);
                if channels == 0 {
                    return Err(BufferError::ZeroChannels);
                }
                let channel_count = u16::try_from(channels)
                    .map_err(|_| BufferError::TooManyChannels(channels))?;

                let mut samples = Vec::with_capacity(frames.len() * channels);
                for (index, frame) in frames.into_iter().enumerate() {
                    if frame.len() != channels {
                        return Err(BufferError::RaggedFrame {
                            frame: index,
                            expected: channels,
                            found: frame.len(),
                        });
                    }
                    samples.extend(frame.into_iter().map(<f32 as cpal::Sample>::from_sample));
                }
                Self::from_interleaved(samples, channel_count, sample_rate)
            }
        }
    }

    /// Builds a buffer from already interleaved `f32` samples.
    pub fn from_interleaved(
        samples: Vec<f32>,
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        if channel_count == 0 {
            return Err(BufferError::ZeroChannels);
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(BufferError::PartialFrame {
                samples: samples.len(),
                channels: channel_count,
            });
        }

        let frame_count = samples.len() / channel_count as usize;
        Ok(Self {
            samples,
            sample_rate,
            channel_count,
            frame_count,
        })
    }

    /// Scales the buffer in place so that its absolute peak equals `target_peak`.
    /// Silent buffers are left untouched.
    pub fn normalize(&mut self, target_peak: f32) {
        let peak = self.peak();
        if peak == 0.0 {
            return;
        }

        let gain = target_peak / peak;
        for sample in self.samples.iter_mut() {
            *sample *= gain;
        }
    }

    /// Consumes the buffer and returns a normalized copy.
    pub fn normalized(mut self, target_peak: f32) -> Self {
        self.normalize(target_peak);
        self
    }

    /// The largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Length of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Length of the buffer as a [`Duration`].
    pub fn duration_time(&self) -> Duration {
        Duration::from_secs_f64(self.duration())
    }

    /// Returns the samples as a single channel. Mono buffers are borrowed as-is;
    /// multi-channel buffers are averaged per frame.
    pub fn mono_view(&self) -> Cow<'_, [f32]> {
        if self.is_mono() {
            return Cow::Borrowed(&self.samples);
        }

        let channels = self.channel_count as usize;
        Cow::Owned(
            self.samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
        )
    }

    /// Returns the samples of the given frame, one per channel.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let channels = self.channel_count as usize;
        let start = index.checked_mul(channels)?;
        self.samples.get(start..start + channels)
    }

    /// The interleaved sample data.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_mono(&self) -> bool {
        self.channel_count == 1
    }

    /// Returns the memory size of the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_from_samples() {
        let buffer =
            AudioBuffer::from_samples(SampleData::Mono(vec![0.1f32, 0.2, 0.3]), 44100).unwrap();

        assert!(buffer.is_mono());
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.samples().len(), buffer.frame_count());
    }

    #[test]
    fn test_frames_are_interleaved() {
        let buffer = AudioBuffer::from_samples(
            SampleData::Frames(vec![vec![0.1f32, -0.1], vec![0.2, -0.2]]),
            48000,
        )
        .unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.samples(), &[0.1, -0.1, 0.2, -0.2]);
        assert_eq!(buffer.frame(1), Some(&[0.2f32, -0.2][..]));
        assert_eq!(buffer.frame(2), None);
    }

    #[test]
    fn test_integer_samples_are_converted() {
        let buffer =
            AudioBuffer::from_samples(SampleData::Mono(vec![i16::MIN, 0, 16384]), 44100).unwrap();

        assert_eq!(buffer.samples()[0], -1.0);
        assert_eq!(buffer.samples()[1], 0.0);
        assert!((buffer.samples()[2] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_shapes() {
        let ragged = AudioBuffer::from_samples(
            SampleData::Frames(vec![vec![0.0f32, 0.0], vec![0.0]]),
            44100,
        );
        assert_eq!(
            ragged,
            Err(BufferError::RaggedFrame {
                frame: 1,
                expected: 2,
                found: 1
            })
        );

        let empty_frame =
            AudioBuffer::from_samples(SampleData::Frames(vec![Vec::<f32>::new()]), 44100);
        assert_eq!(empty_frame, Err(BufferError::ZeroChannels));

        assert_eq!(
            AudioBuffer::from_interleaved(vec![0.0; 3], 2, 44100),
            Err(BufferError::PartialFrame {
                samples: 3,
                channels: 2
            })
        );
        assert_eq!(
            AudioBuffer::from_interleaved(vec![0.0; 2], 1, 0),
            Err(BufferError::ZeroSampleRate)
        );
    }

    #[test]
    fn test_normalize() {
        let mut buffer = AudioBuffer::from_interleaved(vec![0.25, -0.5, 0.1, 0.0], 2, 44100).unwrap();
        buffer.normalize(0.9);

        assert!((buffer.peak() - 0.9).abs() < 1e-6);
        // Relative levels are preserved.
        assert!((buffer.samples()[0] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_silence_is_noop() {
        let mut buffer = AudioBuffer::from_interleaved(vec![0.0; 8], 1, 44100).unwrap();
        buffer.normalize(1.0);
        assert!(buffer.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0; 44100 * 2], 2, 44100).unwrap();
        assert_eq!(buffer.duration(), 1.0);
        assert_eq!(buffer.duration_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_mono_view() {
        let mono = AudioBuffer::from_interleaved(vec![0.5, 0.25], 1, 44100).unwrap();
        assert!(matches!(mono.mono_view(), Cow::Borrowed(_)));

        let stereo = AudioBuffer::from_interleaved(vec![1.0, 0.0, 0.5, -0.5], 2, 44100).unwrap();
        assert_eq!(stereo.mono_view().as_ref(), &[0.5, 0.0]);
    }
}
