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
use clap::{crate_version, Parser, Subcommand};
use padsampler::audio;
use padsampler::config::Sampler;
use padsampler::controller::{keyboard, Controller};
use padsampler::samples::{Engine, PlaybackEvent};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pad sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads every pad in the given config and prints what was loaded.
    Verify {
        /// The path to the sampler config.
        config_path: String,
    },
    /// Opens the configured output device and plays pads from keyboard input.
    Play {
        /// The path to the sampler config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { config_path } => {
            let sampler = Sampler::deserialize(&PathBuf::from(&config_path))?;
            let engine = Engine::with_file_loader(sampler.engine());
            let pads = sampler.pads();

            println!("Pads (count: {}):", pads.len());
            for assignment in pads.iter() {
                let sample = assignment.sample();
                if let Err(e) =
                    engine.try_load_sample(assignment.pad(), sample, sampler.engine().normalize())
                {
                    println!("- Pad {}: FAILED ({})", assignment.pad(), e);
                    continue;
                }
                engine.flush_commands();

                let Some(path) = sample.path() else {
                    continue;
                };
                let Some(buffer) = engine.cached_sample(path) else {
                    continue;
                };
                println!(
                    "- Pad {}: {} (mode={:?}, volume={}, channels={}, duration={:.3}s, memory={}KB)",
                    assignment.pad(),
                    path.display(),
                    sample.mode(),
                    sample.volume(),
                    buffer.channel_count(),
                    buffer.duration(),
                    buffer.memory_size() / 1024,
                );
            }
            println!(
                "Loaded {} samples using {}KB.",
                engine.cached_sample_count(),
                engine.memory_usage() / 1024
            );
        }
        Commands::Play { config_path } => {
            let sampler = Sampler::deserialize(&PathBuf::from(&config_path))?;
            let engine = Arc::new(Engine::with_file_loader(sampler.engine()));

            engine.preload_pads(&sampler.pads());

            let device = audio::get_device(sampler.audio())?;
            info!(device = device.name(), "Opening output device");
            let _stream = device.start(
                engine.clone(),
                sampler.audio(),
                sampler.engine().block_size(),
            )?;

            engine.register_observer(
                None,
                Arc::new(|event: PlaybackEvent| {
                    info!(pad = event.pad, kind = ?event.kind, "Playback event");
                }),
            );
            let _dispatcher = engine.spawn_event_dispatcher();

            let mut controller = Controller::new(engine.clone(), Arc::new(keyboard::Driver::new()));
            controller.join().await?;

            info!(
                dropped_commands = engine.dropped_command_count(),
                dropped_events = engine.dropped_event_count(),
                "Sampler stopped"
            );
        }
    }

    Ok(())
}
