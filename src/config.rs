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

use ::config::{Config, File};
use serde::Deserialize;

mod audio;
mod engine;
mod error;
mod pads;

pub use self::audio::Audio;
pub use self::engine::Engine;
pub use self::error::ConfigError;
pub use self::pads::{PadAssignment, SampleDescriptor};

/// The top level sampler configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sampler {
    /// Engine sizing and mixing settings.
    #[serde(default)]
    engine: Engine,

    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,

    /// The samples assigned to pads.
    #[serde(default)]
    pads: Vec<PadAssignment>,

    /// The directory relative sample paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Sampler {
    /// Creates a new sampler configuration.
    pub fn new(engine: Engine, audio: Audio, pads: Vec<PadAssignment>, base_path: &Path) -> Self {
        Sampler {
            engine,
            audio,
            pads,
            base_path: base_path.to_path_buf(),
        }
    }

    /// Parses a sampler configuration from a YAML file. Relative sample paths
    /// are resolved against the file's directory.
    pub fn deserialize(path: &Path) -> Result<Sampler, ConfigError> {
        let mut sampler = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Sampler>()?;
        sampler.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(sampler)
    }

    /// Gets the engine configuration.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Gets the audio output configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Gets the pad assignments with sample paths resolved.
    pub fn pads(&self) -> Vec<PadAssignment> {
        self.pads
            .iter()
            .map(|assignment| assignment.resolved(&self.base_path))
            .collect()
    }

    /// Gets the directory relative sample paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
