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
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::samples::Engine;

pub mod keyboard;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Starts (or restarts, or toggles) a pad.
    Trigger(usize),

    /// Releases a pad. Only hold and loop pads react.
    Release(usize),

    /// Stops a pad regardless of its mode.
    Stop(usize),

    /// Stops every pad.
    StopAll,

    /// Sets the master volume.
    MasterVolume(f32),

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds driver events to an engine.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(engine: Arc<Engine>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(engine, driver).await }),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine commands by watching the driver and getting events from it.
    async fn trigger_events(engine: Arc<Engine>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        info!(pad_count = engine.pad_count(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            if event == Event::Quit {
                break;
            }
            Controller::apply(&engine, event);
        }

        info!("Controller closing.");
        events_rx.close();
        match join_handle.await {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            Ok(Ok(())) => {}
        }
    }

    fn apply(engine: &Engine, event: Event) {
        let result = match event {
            // Trigger and release failures are already logged by the engine.
            Event::Trigger(pad) => {
                engine.trigger_pad(pad);
                Ok(())
            }
            Event::Release(pad) => {
                engine.release_pad(pad);
                Ok(())
            }
            Event::Stop(pad) => engine.stop_pad(pad),
            Event::StopAll => engine.stop_all(),
            Event::MasterVolume(volume) => {
                engine.set_master_volume(volume);
                Ok(())
            }
            Event::Quit => Ok(()),
        };
        if let Err(e) = result {
            error!("Error talking to engine: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io, sync::Arc};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::audio::AudioBuffer;
    use crate::config::{self, SampleDescriptor};
    use crate::samples::{Engine, PlaybackMode};
    use crate::testutil::MemoryLoader;

    use super::{Controller, Driver, Event};

    /// Sends a fixed list of events and then finishes.
    struct ScriptedDriver {
        events: Mutex<Vec<Event>>,
    }

    impl ScriptedDriver {
        fn new(events: Vec<Event>) -> ScriptedDriver {
            ScriptedDriver {
                events: Mutex::new(events),
            }
        }
    }

    impl Driver for ScriptedDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock());
            tokio::task::spawn_blocking(move || {
                for event in events {
                    if events_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn engine() -> Arc<Engine> {
        let buffer = AudioBuffer::from_interleaved(vec![0.1; 1000], 1, 44100).unwrap();
        let loader = MemoryLoader::new().with("pad.wav", buffer);
        let engine = Engine::new(&config::Engine::new(4, 44100, 1), Arc::new(loader));
        for (pad, mode) in [(0, PlaybackMode::Loop), (1, PlaybackMode::Hold)] {
            assert!(engine.load_sample(pad, &SampleDescriptor::file("pad.wav", mode, 1.0), false));
        }
        Arc::new(engine)
    }

    fn render(engine: &Engine) {
        let mut output = vec![0.0; 16];
        engine.audio_callback(&mut output, 16);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() {
        let engine = engine();
        let driver = Arc::new(ScriptedDriver::new(vec![
            Event::Trigger(0),
            Event::Trigger(1),
            Event::Release(1),
            Event::Trigger(2),
            Event::Stop(99),
            Event::MasterVolume(0.5),
            Event::Quit,
            Event::Trigger(3),
        ]));

        let mut controller = Controller::new(engine.clone(), driver);
        controller.join().await.unwrap();

        render(&engine);
        assert_eq!(engine.playing_pad_indices(), vec![0]);
        assert_eq!(engine.master_volume(), 0.5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_stops_when_driver_finishes() {
        let engine = engine();
        let driver = Arc::new(ScriptedDriver::new(vec![
            Event::Trigger(0),
            Event::Trigger(1),
        ]));

        let mut controller = Controller::new(engine.clone(), driver);
        controller.join().await.unwrap();
        render(&engine);
        assert_eq!(engine.active_voice_count(), 2);

        let driver = Arc::new(ScriptedDriver::new(vec![Event::StopAll]));
        let mut controller = Controller::new(engine.clone(), driver);
        controller.join().await.unwrap();
        render(&engine);
        assert_eq!(engine.active_voice_count(), 0);
    }
}
