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
//! Sample storage, decoding, mixing and hardware output.

use std::error::Error;

pub mod buffer;
pub mod cpal;
pub mod loader;
pub mod mixer;
pub mod thread_priority;

pub use buffer::{AudioBuffer, BufferError, SampleData};
pub use loader::{FileLoader, LoaderError, SampleLoader};
pub use mixer::Mixer;

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::Device>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the output device named in the configuration.
pub fn get_device(config: &crate::config::Audio) -> Result<cpal::Device, Box<dyn Error>> {
    cpal::Device::get(config)
}
