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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::samples::PlaybackMode;

fn default_volume() -> f32 {
    1.0
}

/// Describes the sample assigned to a pad and how it plays.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SampleDescriptor {
    /// The audio file. A descriptor without a path has no sample.
    path: Option<PathBuf>,

    /// Trigger/release behavior.
    #[serde(default)]
    mode: PlaybackMode,

    /// Pad volume (0.0 to 1.0).
    #[serde(default = "default_volume")]
    volume: f32,
}

impl SampleDescriptor {
    /// Creates a new sample descriptor.
    pub fn new(path: Option<PathBuf>, mode: PlaybackMode, volume: f32) -> Self {
        Self { path, mode, volume }
    }

    /// Creates a descriptor for the given file.
    pub fn file(path: impl Into<PathBuf>, mode: PlaybackMode, volume: f32) -> Self {
        Self::new(Some(path.into()), mode, volume)
    }

    /// Gets the audio file path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the playback mode.
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Gets the volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Returns a copy with a relative path joined onto `base_path`.
    pub fn resolved(&self, base_path: &Path) -> SampleDescriptor {
        let path = self.path.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                base_path.join(path)
            }
        });
        SampleDescriptor {
            path,
            mode: self.mode,
            volume: self.volume,
        }
    }
}

/// A sample descriptor bound to a pad index.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PadAssignment {
    /// The pad index.
    pad: usize,

    /// The sample for the pad.
    #[serde(flatten)]
    sample: SampleDescriptor,
}

impl PadAssignment {
    /// Creates a new pad assignment.
    pub fn new(pad: usize, sample: SampleDescriptor) -> Self {
        Self { pad, sample }
    }

    /// Gets the pad index.
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Gets the sample descriptor.
    pub fn sample(&self) -> &SampleDescriptor {
        &self.sample
    }

    /// Returns a copy with the sample path resolved against `base_path`.
    pub fn resolved(&self, base_path: &Path) -> PadAssignment {
        PadAssignment {
            pad: self.pad,
            sample: self.sample.resolved(base_path),
        }
    }
}
