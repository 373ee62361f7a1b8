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

//! Decoding sample files into [`AudioBuffer`]s.
//!
//! Files are decoded entirely into memory on a control thread. If the file's
//! sample rate differs from the engine's, it is resampled once here so the
//! audio thread never has to.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use super::buffer::{AudioBuffer, BufferError};

/// Errors produced while loading a sample file.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("unable to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("no audio track found in {0}")]
    NoTrack(PathBuf),

    #[error("sample rate not specified in {0}")]
    UnknownSampleRate(PathBuf),

    #[error("{0} decoded to no audio")]
    Empty(PathBuf),

    #[error("invalid sample data in {path}: {source}")]
    Buffer {
        path: PathBuf,
        #[source]
        source: BufferError,
    },
}

/// Turns a sample path into an in-memory buffer.
pub trait SampleLoader: Send + Sync {
    /// Loads the sample at `path`.
    fn load(&self, path: &Path) -> Result<AudioBuffer, LoaderError>;
}

/// Loads audio files (WAV, FLAC, MP3, etc.) from disk using symphonia.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    /// Sample rate decoded files are converted to. `None` keeps the file's rate.
    target_sample_rate: Option<u32>,
}

impl FileLoader {
    /// Creates a loader that resamples everything to `target_sample_rate`.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: Some(target_sample_rate),
        }
    }

    /// Creates a loader that keeps each file's native sample rate.
    pub fn native() -> Self {
        Self {
            target_sample_rate: None,
        }
    }

    /// Decodes the whole file into interleaved f32 samples.
    fn decode(path: &Path) -> Result<(Vec<f32>, u16, u32), LoaderError> {
        let file = File::open(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let decode_err = |source| LoaderError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoaderError::NoTrack(path.to_path_buf()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LoaderError::UnknownSampleRate(path.to_path_buf()))?;
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;

        let mut samples = Vec::new();
        let mut sample_buffer: Option<SampleBuffer<f32>> = None;
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(decode_err(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Recoverable corruption in a single packet; skip it.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = ?path, error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(decode_err(e)),
            };

            if channels == 0 {
                channels = decoded.spec().channels.count() as u16;
            }
            let buffer = sample_buffer.get_or_insert_with(|| {
                SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
            });
            if buffer.capacity() < decoded.capacity() * decoded.spec().channels.count() {
                *buffer = SampleBuffer::new(decoded.capacity() as u64, *decoded.spec());
            }
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        if samples.is_empty() || channels == 0 {
            return Err(LoaderError::Empty(path.to_path_buf()));
        }

        Ok((samples, channels, sample_rate))
    }
}

impl SampleLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<AudioBuffer, LoaderError> {
        let (samples, channels, source_rate) = Self::decode(path)?;

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != source_rate => {
                info!(
                    path = ?path,
                    source_rate,
                    target_rate = target,
                    "Resampling sample"
                );
                (resample_linear(&samples, channels, source_rate, target), target)
            }
            _ => (samples, source_rate),
        };

        AudioBuffer::from_interleaved(samples, channels, sample_rate).map_err(|source| {
            LoaderError::Buffer {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// Resamples interleaved audio with linear interpolation. Cheap and good enough
/// for one-shot hits and loops; this only ever runs at load time.
pub fn resample_linear(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let channels = channel_count as usize;
    let ratio = target_rate as f64 / source_rate as f64;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sine, write_wav};

    #[test]
    fn test_load_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let left = sine(440.0, 44100, 441);
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        write_wav(&path, &[left.clone(), right], 44100).unwrap();

        let buffer = FileLoader::native().load(&path).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frame_count(), 441);
        for (frame, expected) in buffer.samples().chunks_exact(2).zip(&left) {
            assert!((frame[0] - expected).abs() < 1e-6);
            assert!((frame[1] + expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_resamples_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &[sine(440.0, 44100, 4410)], 44100).unwrap();

        let buffer = FileLoader::new(48000).load(&path).unwrap();
        let expected = (4410.0_f64 * (48000.0_f64 / 44100.0)).ceil() as usize;
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.frame_count(), expected);
    }

    #[test]
    fn test_missing_file() {
        let result = FileLoader::native().load(Path::new("/nonexistent/kick.wav"));
        assert!(matches!(result, Err(LoaderError::Io { .. })));
    }

    #[test]
    fn test_unreadable_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();

        assert!(FileLoader::native().load(&path).is_err());
    }

    #[test]
    fn test_resample_stereo_preserves_channels() {
        let source = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = resample_linear(&source, 2, 44100, 48000);

        assert_eq!(result.len() % 2, 0);
        assert!(result.len() >= source.len());
        for frame in result.chunks_exact(2) {
            assert!((frame[0] - 1.0).abs() < 1e-6);
            assert!((frame[1] + 1.0).abs() < 1e-6);
        }
    }
}
