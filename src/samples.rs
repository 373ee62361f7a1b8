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
//! Pad playback.
//!
//! This module provides:
//! - Per-pad voices with one-shot, hold, loop and loop-toggle behavior
//! - A path-keyed cache of decoded samples
//! - The bounded command queue feeding the audio thread
//! - Playback lifecycle events and observers
//! - The engine tying these together behind a real-time render callback

mod cache;
mod command;
mod engine;
mod events;
mod status;
mod voice;

pub use cache::SampleCache;
pub use command::{Command, CommandQueue};
pub use engine::{Engine, EngineError};
pub use events::{
    EventDispatcher, ObserverId, PlaybackEvent, PlaybackEventKind, PlaybackObserver,
};
pub use status::PlaybackInfo;
pub use voice::{PlaybackMode, PlaybackVoice, VoiceError};
