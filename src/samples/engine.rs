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
//! The pad engine: control surface for non-real-time threads and the
//! real-time render callback.
//!
//! Every change to voice state travels through the command queue and is
//! applied by the audio callback, so voices have exactly one writer. Control
//! threads learn about playback through the status board and the event queue.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::cache::SampleCache;
use super::command::{Command, CommandQueue};
use super::events::{
    EventDispatcher, EventQueue, ObserverId, Observers, PlaybackEvent, PlaybackEventKind,
    PlaybackObserver,
};
use super::status::{PlaybackInfo, StatusBoard};
use super::voice::{PlaybackMode, PlaybackVoice};
use crate::audio::{AudioBuffer, FileLoader, LoaderError, Mixer, SampleLoader};
use crate::config::{self, PadAssignment, SampleDescriptor};

/// Errors surfaced to control threads.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("pad {pad} is out of range (pad count {pad_count})")]
    InvalidPad { pad: usize, pad_count: usize },

    #[error("no sample given for pad {0}")]
    MissingSample(usize),

    #[error("failed to load sample for pad {pad}: {source}")]
    Load {
        pad: usize,
        #[source]
        source: LoaderError,
    },

    #[error("command queue is full")]
    QueueFull,

    #[error("output block holds {available} samples, {needed} needed")]
    OutputTooSmall { needed: usize, available: usize },

    #[error("voice table is busy")]
    ProcessorBusy,
}

/// State owned by the audio callback.
struct AudioProcessor {
    voices: Vec<PlaybackVoice>,
    mixer: Mixer,
    /// Pads playing before the mix of the current block.
    was_playing: Vec<bool>,
}

impl AudioProcessor {
    /// Applies one command to the voice table.
    fn apply(
        &mut self,
        command: Command,
        events: &EventQueue,
        retired: &Sender<Arc<AudioBuffer>>,
    ) {
        match command {
            Command::Trigger(pad) => {
                let Some(voice) = self.loaded_voice(pad) else {
                    return;
                };
                let was_playing = voice.is_playing();
                if voice.mode() == PlaybackMode::LoopToggle {
                    match voice.toggle() {
                        Ok(true) => {
                            events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Triggered));
                            events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Playing));
                        }
                        Ok(false) => {
                            events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Triggered));
                            events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                        }
                        Err(_) => {}
                    }
                } else if voice.start().is_ok() {
                    events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Triggered));
                    if !was_playing {
                        events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Playing));
                    }
                }
            }
            Command::Release(pad) => {
                let Some(voice) = self.loaded_voice(pad) else {
                    return;
                };
                if voice.mode().stops_on_release() && voice.is_playing() {
                    voice.stop();
                    events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                }
            }
            Command::Stop(pad) => {
                if let Some(voice) = self.voices.get_mut(pad) {
                    if voice.is_playing() {
                        voice.stop();
                        events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                    }
                }
            }
            Command::StopAll => {
                for (pad, voice) in self.voices.iter_mut().enumerate() {
                    if voice.is_playing() {
                        voice.stop();
                        events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                    }
                }
            }
            Command::SetVolume { pad, volume } => {
                if let Some(voice) = self.voices.get_mut(pad) {
                    voice.set_volume(volume);
                }
            }
            Command::SetMode { pad, mode } => {
                if let Some(voice) = self.voices.get_mut(pad) {
                    voice.set_mode(mode);
                }
            }
            Command::Assign {
                pad,
                buffer,
                mode,
                volume,
            } => {
                let Some(voice) = self.voices.get_mut(pad) else {
                    retire(retired, buffer);
                    return;
                };
                let was_playing = voice.is_playing();
                if let Some(previous) = voice.assign(buffer, mode, volume) {
                    retire(retired, previous);
                }
                if was_playing {
                    events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                }
            }
            Command::Unload(pad) => {
                if let Some(voice) = self.voices.get_mut(pad) {
                    let was_playing = voice.is_playing();
                    if let Some(previous) = voice.clear() {
                        retire(retired, previous);
                    }
                    if was_playing {
                        events.publish(PlaybackEvent::new(pad, PlaybackEventKind::Stopped));
                    }
                }
            }
        }
    }

    fn loaded_voice(&mut self, pad: usize) -> Option<&mut PlaybackVoice> {
        self.voices.get_mut(pad).filter(|voice| voice.is_loaded())
    }
}

/// Hands a displaced buffer back to the control side so its memory is not
/// freed on the audio thread. If the retirement queue is full the buffer is
/// dropped here.
fn retire(retired: &Sender<Arc<AudioBuffer>>, buffer: Arc<AudioBuffer>) {
    let _ = retired.try_send(buffer);
}

/// The pad sampler engine.
pub struct Engine {
    pad_count: usize,
    sample_rate: u32,
    channels: u16,
    /// Whether `load_pads` normalizes samples.
    normalize: bool,
    normalize_peak: f32,

    loader: Arc<dyn SampleLoader>,
    cache: SampleCache,

    commands: CommandQueue,
    events: EventQueue,
    observers: Arc<Observers>,
    status: StatusBoard,

    /// f32 bits.
    master_volume: AtomicU32,

    retired_tx: Sender<Arc<AudioBuffer>>,
    retired_rx: Receiver<Arc<AudioBuffer>>,

    processor: Mutex<AudioProcessor>,
}

impl Engine {
    /// Creates a new engine using the given loader for sample files.
    pub fn new(config: &config::Engine, loader: Arc<dyn SampleLoader>) -> Engine {
        let pad_count = config.pad_count();
        let channels = config.channels();
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(pad_count.max(1) * 2);

        info!(
            pad_count,
            sample_rate = config.sample_rate(),
            channels,
            block_size = config.block_size(),
            command_queue_capacity = config.command_queue_capacity(),
            "Creating pad engine"
        );

        Engine {
            pad_count,
            sample_rate: config.sample_rate(),
            channels,
            normalize: config.normalize(),
            normalize_peak: config.normalize_peak(),
            loader,
            cache: SampleCache::new(),
            commands: CommandQueue::new(config.command_queue_capacity()),
            events: EventQueue::new(config.event_queue_capacity()),
            observers: Arc::new(Observers::new()),
            status: StatusBoard::new(pad_count),
            master_volume: AtomicU32::new(config.master_volume().to_bits()),
            retired_tx,
            retired_rx,
            processor: Mutex::new(AudioProcessor {
                voices: (0..pad_count).map(|_| PlaybackVoice::new()).collect(),
                mixer: Mixer::new(channels, config.block_size()),
                was_playing: vec![false; pad_count],
            }),
        }
    }

    /// Creates a new engine that decodes files from disk, resampling them to
    /// the engine's sample rate.
    pub fn with_file_loader(config: &config::Engine) -> Engine {
        Engine::new(config, Arc::new(FileLoader::new(config.sample_rate())))
    }

    pub fn pad_count(&self) -> usize {
        self.pad_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Loads the sample described by `descriptor` and assigns it to a pad.
    /// Returns false and logs if the pad is out of range, the descriptor has
    /// no sample, decoding fails, or the assignment could not be queued. A
    /// failed load leaves the pad's previous sample in place.
    pub fn load_sample(&self, pad: usize, descriptor: &SampleDescriptor, normalize: bool) -> bool {
        match self.try_load_sample(pad, descriptor, normalize) {
            Ok(()) => true,
            Err(e) => {
                error!(pad, err = %e, "Failed to load sample");
                false
            }
        }
    }

    /// Like [`Engine::load_sample`], but returns the reason for a failure.
    ///
    /// Normalization happens when a file is first decoded. Later loads of the
    /// same path reuse the cached buffer as is.
    pub fn try_load_sample(
        &self,
        pad: usize,
        descriptor: &SampleDescriptor,
        normalize: bool,
    ) -> Result<(), EngineError> {
        self.collect_retired();
        self.check_pad(pad)?;
        let path = descriptor.path().ok_or(EngineError::MissingSample(pad))?;

        let peak = normalize.then_some(self.normalize_peak);
        let buffer = self
            .cache
            .get_or_load(path, self.loader.as_ref(), peak)
            .map_err(|source| EngineError::Load { pad, source })?;

        self.push_control(Command::Assign {
            pad,
            buffer,
            mode: descriptor.mode(),
            volume: descriptor.volume(),
        })?;

        info!(
            pad,
            path = ?path,
            mode = ?descriptor.mode(),
            volume = descriptor.volume(),
            "Assigned sample to pad"
        );
        Ok(())
    }

    /// Loads every assignment, returning how many succeeded. Failures are
    /// logged and skipped.
    pub fn load_pads(&self, assignments: &[PadAssignment]) -> usize {
        let loaded = assignments
            .iter()
            .filter(|assignment| {
                self.load_sample(assignment.pad(), assignment.sample(), self.normalize)
            })
            .count();
        info!(
            loaded,
            total = assignments.len(),
            "Loaded pad samples"
        );
        loaded
    }

    /// Like `load_pads`, but applies each assignment before queueing the next,
    /// so any number of pads fit through the command queue. Call before an
    /// output stream is driving the engine.
    pub fn preload_pads(&self, assignments: &[PadAssignment]) -> usize {
        let mut loaded = 0;
        for assignment in assignments {
            if self.load_sample(assignment.pad(), assignment.sample(), self.normalize) {
                loaded += 1;
            }
            self.flush_commands();
        }
        info!(
            loaded,
            total = assignments.len(),
            "Preloaded pad samples"
        );
        loaded
    }

    /// Applies every queued command right away by rendering an empty block on
    /// the calling thread. Only for use while no output stream is driving the
    /// engine, e.g. when loading pads before the stream opens.
    pub fn flush_commands(&self) {
        self.audio_callback(&mut [], 0);
    }

    /// Stops a pad and removes its sample.
    pub fn unload_sample(&self, pad: usize) -> Result<(), EngineError> {
        self.collect_retired();
        self.check_pad(pad)?;
        self.push_control(Command::Unload(pad))?;
        debug!(pad, "Unloading pad");
        Ok(())
    }

    /// Queues a trigger for a pad without blocking. Returns false if the pad is
    /// out of range or the queue is full, in which case the trigger is lost.
    pub fn trigger_pad(&self, pad: usize) -> bool {
        self.push_realtime(Command::Trigger(pad))
    }

    /// Queues a release for a pad without blocking. Returns false if the pad is
    /// out of range or the queue is full, in which case the release is lost.
    pub fn release_pad(&self, pad: usize) -> bool {
        self.push_realtime(Command::Release(pad))
    }

    /// Stops a pad regardless of its mode.
    pub fn stop_pad(&self, pad: usize) -> Result<(), EngineError> {
        self.check_pad(pad)?;
        self.push_control(Command::Stop(pad))
    }

    /// Stops every pad. Takes effect on the next callback.
    pub fn stop_all(&self) -> Result<(), EngineError> {
        self.push_control(Command::StopAll)?;
        info!("Stopping all pads");
        Ok(())
    }

    /// Changes a pad's volume. Takes effect on the next callback.
    pub fn update_pad_volume(&self, pad: usize, volume: f32) -> Result<(), EngineError> {
        self.check_pad(pad)?;
        self.push_control(Command::SetVolume { pad, volume })
    }

    /// Changes a pad's playback mode. Takes effect on the next callback.
    pub fn update_pad_mode(&self, pad: usize, mode: PlaybackMode) -> Result<(), EngineError> {
        self.check_pad(pad)?;
        self.push_control(Command::SetMode { pad, mode })
    }

    /// Sets the master volume, clamped to 0.0..=1.0.
    pub fn set_master_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.master_volume
            .store(volume.to_bits(), Ordering::Relaxed);
        debug!(volume, "Master volume set");
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    /// Registers an observer for one pad, or every pad when `pad` is `None`.
    pub fn register_observer(
        &self,
        pad: Option<usize>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> ObserverId {
        self.observers.register(pad, observer)
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Delivers pending playback events to observers on the calling thread.
    /// Returns how many events were delivered.
    pub fn dispatch_events(&self) -> usize {
        self.events.dispatch(&self.observers)
    }

    /// Starts a background thread that delivers playback events as they are
    /// produced. Delivery stops when the returned dispatcher is dropped.
    pub fn spawn_event_dispatcher(&self) -> EventDispatcher {
        EventDispatcher::spawn(self.events.receiver(), self.observers.clone())
    }

    /// Renders `frame_count` frames of interleaved audio into `output`.
    ///
    /// This is the real-time entry point. It never blocks and never panics:
    /// any failure is logged and the block is rendered as silence. Samples in
    /// `output` beyond `frame_count * channels` are zeroed.
    pub fn audio_callback(&self, output: &mut [f32], frame_count: usize) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.render(output, frame_count))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(err = %e, "Audio callback failed, rendering silence");
                output.fill(0.0);
            }
            Err(_) => {
                error!("Audio callback panicked, rendering silence");
                output.fill(0.0);
            }
        }
    }

    fn render(&self, output: &mut [f32], frame_count: usize) -> Result<(), EngineError> {
        let needed = frame_count * self.channels as usize;
        if output.len() < needed {
            return Err(EngineError::OutputTooSmall {
                needed,
                available: output.len(),
            });
        }

        let mut processor = self
            .processor
            .try_lock()
            .ok_or(EngineError::ProcessorBusy)?;
        let processor = &mut *processor;

        // Bounded so producers pushing during the drain cannot stall the block.
        let pending = self.commands.capacity();
        for command in self.commands.drain().take(pending) {
            processor.apply(command, &self.events, &self.retired_tx);
        }

        for (was_playing, voice) in processor.was_playing.iter_mut().zip(&processor.voices) {
            *was_playing = voice.is_active();
        }

        let (block, rest) = output.split_at_mut(needed);
        processor
            .mixer
            .mix(&mut processor.voices, frame_count, block);

        for (pad, (was_playing, voice)) in processor
            .was_playing
            .iter()
            .zip(&processor.voices)
            .enumerate()
        {
            if *was_playing && !voice.is_active() {
                self.events
                    .publish(PlaybackEvent::new(pad, PlaybackEventKind::Finished));
            }
        }

        Mixer::apply_master_volume(block, self.master_volume());
        Mixer::soft_clip(block);
        rest.fill(0.0);

        self.status.publish(&processor.voices);
        Ok(())
    }

    /// Number of pads currently playing, as of the last callback.
    pub fn active_voice_count(&self) -> usize {
        self.status.active_count()
    }

    /// Whether a pad was playing at the end of the last callback.
    pub fn is_pad_playing(&self, pad: usize) -> bool {
        self.status.is_playing(pad)
    }

    /// Indices of the pads playing at the end of the last callback.
    pub fn playing_pad_indices(&self) -> Vec<usize> {
        self.status.playing_pads()
    }

    /// Playback info for a pad, as of the last callback.
    pub fn playback_info(&self, pad: usize) -> Option<PlaybackInfo> {
        self.status.info(pad)
    }

    /// Drops every cached sample. Pads keep playing the samples already
    /// assigned to them.
    pub fn clear_cache(&self) {
        self.collect_retired();
        let count = self.cache.len();
        self.cache.clear();
        info!(count, "Cleared sample cache");
    }

    /// Removes one path from the sample cache.
    pub fn evict_sample(&self, path: &Path) -> bool {
        self.collect_retired();
        self.cache.evict(path).is_some()
    }

    /// Gets the cached buffer for a path, if it has been loaded.
    pub fn cached_sample(&self, path: &Path) -> Option<Arc<AudioBuffer>> {
        self.cache.get(path)
    }

    pub fn cached_sample_count(&self) -> usize {
        self.cache.len()
    }

    /// Bytes held by cached samples.
    pub fn memory_usage(&self) -> usize {
        self.cache.memory_usage()
    }

    /// Commands rejected because the queue was full.
    pub fn dropped_command_count(&self) -> u64 {
        self.commands.dropped()
    }

    /// Events dropped because nobody drained the event queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.events.dropped()
    }

    fn check_pad(&self, pad: usize) -> Result<(), EngineError> {
        if pad < self.pad_count {
            Ok(())
        } else {
            Err(EngineError::InvalidPad {
                pad,
                pad_count: self.pad_count,
            })
        }
    }

    fn push_realtime(&self, command: Command) -> bool {
        let pad = command.pad().unwrap_or_default();
        if self.check_pad(pad).is_err() {
            warn!(pad, "Ignoring command for out of range pad");
            return false;
        }
        match self.commands.try_push(command) {
            Ok(()) => true,
            Err(command) => {
                warn!(command = ?command, "Command queue full, dropping command");
                false
            }
        }
    }

    fn push_control(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .try_push(command)
            .map_err(|_| EngineError::QueueFull)
    }

    /// Frees buffers the audio thread has displaced from voices.
    fn collect_retired(&self) {
        let count = self.retired_rx.try_iter().count();
        if count > 0 {
            debug!(count, "Released retired sample buffers");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pad_count", &self.pad_count)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("cached_samples", &self.cache.len())
            .field("active_voices", &self.active_voice_count())
            .field("memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
