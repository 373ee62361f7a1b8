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

//! Commands from control and producer threads to the audio thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryIter, TrySendError};

use super::voice::PlaybackMode;
use crate::audio::AudioBuffer;

/// A change to voice state, applied on the audio thread in enqueue order.
#[derive(Debug, Clone)]
pub enum Command {
    /// Start (or restart) playback of a pad.
    Trigger(usize),
    /// End playback of a hold or loop pad.
    Release(usize),
    /// Stop a pad regardless of mode.
    Stop(usize),
    /// Stop every pad.
    StopAll,
    /// Change the volume of a pad.
    SetVolume { pad: usize, volume: f32 },
    /// Change the playback mode of a pad.
    SetMode { pad: usize, mode: PlaybackMode },
    /// Assign a sample to a pad, resetting its progress.
    Assign {
        pad: usize,
        buffer: Arc<AudioBuffer>,
        mode: PlaybackMode,
        volume: f32,
    },
    /// Stop a pad and remove its sample.
    Unload(usize),
}

impl Command {
    /// The pad this command targets, if it targets a single pad.
    pub fn pad(&self) -> Option<usize> {
        match self {
            Command::Trigger(pad)
            | Command::Release(pad)
            | Command::Stop(pad)
            | Command::Unload(pad)
            | Command::SetVolume { pad, .. }
            | Command::SetMode { pad, .. }
            | Command::Assign { pad, .. } => Some(*pad),
            Command::StopAll => None,
        }
    }
}

/// A bounded, multi-producer, single-consumer command queue.
///
/// Slots are allocated once at construction. Pushing never blocks: when the
/// queue is full the command is handed back to the caller and counted as
/// dropped.
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    capacity: usize,
    /// Number of commands rejected because the queue was full.
    dropped: AtomicU64,
}

impl CommandQueue {
    /// Creates a queue holding at most `capacity` pending commands.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues a command without blocking. Returns the command if the queue is
    /// full.
    pub fn try_push(&self, command: Command) -> Result<(), Command> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) | Err(TrySendError::Disconnected(command)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(command)
            }
        }
    }

    /// Drains every command currently queued, in FIFO order.
    pub fn drain(&self) -> TryIter<'_, Command> {
        self.rx.try_iter()
    }

    /// Number of commands waiting to be applied.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of commands rejected so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new(8);
        queue.try_push(Command::Trigger(1)).unwrap();
        queue.try_push(Command::Release(1)).unwrap();
        queue.try_push(Command::StopAll).unwrap();

        let pads: Vec<Option<usize>> = queue.drain().map(|c| c.pad()).collect();
        assert_eq!(pads, vec![Some(1), Some(1), None]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let queue = CommandQueue::new(2);
        assert!(queue.try_push(Command::Trigger(0)).is_ok());
        assert!(queue.try_push(Command::Trigger(1)).is_ok());

        let rejected = queue.try_push(Command::Trigger(2));
        assert!(matches!(rejected, Err(Command::Trigger(2))));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_per_producer_order_is_preserved() {
        let queue = Arc::new(CommandQueue::new(256));
        let producers: Vec<_> = (0..4)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        queue
                            .try_push(Command::SetVolume {
                                pad: producer,
                                volume: i as f32,
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last = [-1.0f32; 4];
        for command in queue.drain() {
            if let Command::SetVolume { pad, volume } = command {
                assert!(volume > last[pad]);
                last[pad] = volume;
            }
        }
        assert_eq!(last, [49.0; 4]);
    }
}
