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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const TRIGGER: &str = "t";
const RELEASE: &str = "r";
const STOP: &str = "s";
const STOP_ALL: &str = "stop";
const VOLUME: &str = "vol";
const QUIT: &str = "quit";

/// A driver that controls pads using the keyboard.
pub struct Driver {}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses a line of input into an event.
    fn parse(input: &str) -> Option<Event> {
        let input = input.trim().to_lowercase();
        let mut parts = input.split_whitespace();
        let command = parts.next()?;
        let argument = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let pad = || argument.and_then(|arg| arg.parse::<usize>().ok());
        match (command, argument) {
            (TRIGGER, Some(_)) => pad().map(Event::Trigger),
            (RELEASE, Some(_)) => pad().map(Event::Release),
            (STOP, Some(_)) => pad().map(Event::Stop),
            (STOP_ALL, None) => Some(Event::StopAll),
            (VOLUME, Some(volume)) => volume.parse::<f32>().ok().map(Event::MasterVolume),
            (QUIT, None) => Some(Event::Quit),
            _ => None,
        }
    }

    /// Reads one command. Returns false once there is nothing more to read.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <pad>, {} <pad>, {} <pad>, {}, {} <0.0-1.0>, {}): ",
            TRIGGER, RELEASE, STOP, STOP_ALL, VOLUME, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let Some(event) = Driver::parse(&input) else {
            warn!(input = input.trim(), "Unrecognized input");
            return Ok(true);
        };
        let keep_going = event != Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(keep_going)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::Driver;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let keep_going = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((keep_going, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Trigger(3))), get_event("t 3\n")?);
        assert_eq!((true, Some(Event::Release(12))), get_event("R 12")?);
        assert_eq!((true, Some(Event::Stop(0))), get_event("  s 0  ")?);
        assert_eq!((true, Some(Event::StopAll)), get_event(STOP_ALL)?);
        assert_eq!((true, Some(Event::MasterVolume(0.5))), get_event("vol 0.5")?);
        assert_eq!((false, Some(Event::Quit)), get_event(QUIT)?);
        Ok(())
    }

    #[test]
    fn test_unrecognized_input() -> Result<(), io::Error> {
        assert_eq!((true, None), get_event("unrecognized")?);
        assert_eq!((true, None), get_event("t")?);
        assert_eq!((true, None), get_event("t x")?);
        assert_eq!((true, None), get_event("t 1 2")?);
        assert_eq!((true, None), get_event("stop 1")?);
        assert_eq!((true, None), get_event("vol loud")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input() -> Result<(), io::Error> {
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }
}
