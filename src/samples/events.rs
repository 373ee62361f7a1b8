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

//! Playback lifecycle notifications.
//!
//! The audio thread only ever pushes [`PlaybackEvent`]s into a bounded queue.
//! Observers are invoked later, off the audio thread, either by an explicit
//! call to drain the queue or by an [`EventDispatcher`] thread. Observers may
//! therefore block or allocate freely.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, span, Level};

/// How long the dispatcher waits for an event before checking for shutdown.
const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The lifecycle transition a pad went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackEventKind {
    /// A trigger command was applied to the pad.
    Triggered,
    /// The pad went from silent to playing.
    Playing,
    /// The pad was stopped by a release or stop command.
    Stopped,
    /// The pad reached the end of its sample on its own.
    Finished,
}

/// A lifecycle event for a single pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaybackEvent {
    pub pad: usize,
    pub kind: PlaybackEventKind,
}

impl PlaybackEvent {
    pub fn new(pad: usize, kind: PlaybackEventKind) -> Self {
        Self { pad, kind }
    }
}

/// Receives playback events.
pub trait PlaybackObserver: Send + Sync {
    fn on_event(&self, event: PlaybackEvent);
}

impl<F> PlaybackObserver for F
where
    F: Fn(PlaybackEvent) + Send + Sync,
{
    fn on_event(&self, event: PlaybackEvent) {
        self(event)
    }
}

/// Identifies a registered observer so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registration {
    id: ObserverId,
    /// Only events for this pad are delivered; `None` receives every pad.
    pad: Option<usize>,
    observer: Arc<dyn PlaybackObserver>,
}

/// The set of registered observers.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for one pad, or for all pads when `pad` is `None`.
    pub fn register(&self, pad: Option<usize>, observer: Arc<dyn PlaybackObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.write().push(Registration { id, pad, observer });
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Delivers an event to every matching observer.
    pub fn notify(&self, event: PlaybackEvent) {
        for registration in self.registrations.read().iter() {
            if registration.pad.map_or(true, |pad| pad == event.pad) {
                registration.observer.on_event(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded queue of events from the audio thread. Publishing never blocks; if
/// nobody drains the queue, new events are dropped and counted.
pub struct EventQueue {
    tx: Sender<PlaybackEvent>,
    rx: Receiver<PlaybackEvent>,
    dropped: AtomicU64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Publishes an event. Called from the audio thread.
    pub fn publish(&self, event: PlaybackEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Delivers every pending event to the observers. Returns how many were
    /// delivered.
    pub fn dispatch(&self, observers: &Observers) -> usize {
        let mut delivered = 0;
        for event in self.rx.try_iter() {
            observers.notify(event);
            delivered += 1;
        }
        delivered
    }

    /// A receiver for consuming events on another thread.
    pub fn receiver(&self) -> Receiver<PlaybackEvent> {
        self.rx.clone()
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A background thread delivering events to observers as they arrive.
/// The thread stops when the dispatcher is dropped.
pub struct EventDispatcher {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EventDispatcher {
    /// Spawns the dispatcher thread.
    pub fn spawn(events: Receiver<PlaybackEvent>, observers: Arc<Observers>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "event dispatcher");
            let _enter = span.enter();
            info!("Event dispatcher started.");

            while !thread_shutdown.load(Ordering::Relaxed) {
                match events.recv_timeout(DISPATCH_POLL_INTERVAL) {
                    Ok(event) => observers.notify(event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            debug!("Event dispatcher stopped.");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::testutil::eventually;

    fn recorder() -> (Arc<Mutex<Vec<PlaybackEvent>>>, Arc<dyn PlaybackObserver>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Arc<dyn PlaybackObserver> =
            Arc::new(move |event: PlaybackEvent| sink.lock().push(event));
        (seen, observer)
    }

    #[test]
    fn test_pad_filtering() {
        let observers = Observers::new();
        let (all, all_observer) = recorder();
        let (pad_two, pad_two_observer) = recorder();
        observers.register(None, all_observer);
        observers.register(Some(2), pad_two_observer);

        observers.notify(PlaybackEvent::new(1, PlaybackEventKind::Triggered));
        observers.notify(PlaybackEvent::new(2, PlaybackEventKind::Finished));

        assert_eq!(all.lock().len(), 2);
        assert_eq!(
            *pad_two.lock(),
            vec![PlaybackEvent::new(2, PlaybackEventKind::Finished)]
        );
    }

    #[test]
    fn test_unregister() {
        let observers = Observers::new();
        let (seen, observer) = recorder();
        let id = observers.register(None, observer);

        assert!(observers.unregister(id));
        assert!(!observers.unregister(id));
        observers.notify(PlaybackEvent::new(0, PlaybackEventKind::Playing));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_queue_drops_when_full() {
        let queue = EventQueue::new(2);
        for pad in 0..5 {
            queue.publish(PlaybackEvent::new(pad, PlaybackEventKind::Triggered));
        }
        assert_eq!(queue.dropped(), 3);

        let observers = Observers::new();
        let (seen, observer) = recorder();
        observers.register(None, observer);
        assert_eq!(queue.dispatch(&observers), 2);
        assert_eq!(seen.lock()[0].pad, 0);
        assert_eq!(seen.lock()[1].pad, 1);
    }

    #[test]
    fn test_dispatcher_thread_delivers() {
        let queue = EventQueue::new(16);
        let observers = Arc::new(Observers::new());
        let (seen, observer) = recorder();
        observers.register(None, observer);

        let dispatcher = EventDispatcher::spawn(queue.receiver(), observers);
        queue.publish(PlaybackEvent::new(7, PlaybackEventKind::Stopped));

        eventually(|| seen.lock().len() == 1, "Event was never dispatched");
        drop(dispatcher);
    }
}
