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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use crate::config;
use crate::samples::Engine;

/// How often the output thread checks whether it should close the stream.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of output channels.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// f32 callback: the engine renders straight into the cpal buffer.
fn create_f32_callback(
    engine: Arc<Engine>,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        engine.audio_callback(data, data.len() / channels);
    }
}

/// Integer callback: render into preallocated scratch space and convert.
fn create_converting_callback<T: cpal::Sample + cpal::FromSample<f32>>(
    engine: Arc<Engine>,
    channels: usize,
    block_size: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch = vec![0.0f32; block_size * channels];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        if scratch.len() < data.len() {
            // Only reached when the host hands us a larger block than configured.
            scratch.resize(data.len(), 0.0);
        }
        let scratch = &mut scratch[..data.len()];
        engine.audio_callback(scratch, data.len() / channels);

        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// A running output stream. The stream lives on its own thread and is closed
/// when this is dropped.
pub struct OutputStream {
    device: String,
    shutdown: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("device", &self.device)
            .field("running", &!self.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Device {
    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the configured device. "default" resolves to the default output
    /// device of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        if config.is_default_device() {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let max_channels = device.default_output_config()?.channels();
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
            });
        }

        let name = config.device();
        Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name).into())
    }

    /// Gets the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the maximum number of output channels.
    pub fn max_channels(&self) -> u16 {
        self.max_channels
    }

    /// Opens an output stream that renders the engine. Returns once the stream
    /// is playing or failed to start.
    pub fn start(
        &self,
        engine: Arc<Engine>,
        config: &config::Audio,
        block_size: usize,
    ) -> Result<OutputStream, Box<dyn Error>> {
        let channels = engine.channels();
        if channels > self.max_channels {
            return Err(format!(
                "device {} supports {} channels, {} requested",
                self.name, self.max_channels, channels
            )
            .into());
        }

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: engine.sample_rate(),
            buffer_size: match config.buffer_size() {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        let sample_format = self.device.default_output_config()?.sample_format();

        let device = self.device.clone();
        let device_name = self.name.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        // cpal streams are not Send on every host, so the stream is created
        // and kept alive on a dedicated thread.
        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "output stream (cpal)");
            let _enter = span.enter();

            let channels = channels as usize;
            let error_callback = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &stream_config,
                    create_f32_callback(engine, channels),
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i16>(engine, channels, block_size),
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i32>(engine, channels, block_size),
                    error_callback,
                    None,
                ),
                other => {
                    let _ = started_tx.send(Err(format!("unsupported sample format {:?}", other)));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(format!("failed to create stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(format!("failed to start stream: {}", e)));
                return;
            }
            info!("CPAL output stream started successfully");
            let _ = started_tx.send(Ok(()));

            // Keep the stream alive until shutdown.
            while !thread_shutdown.load(Ordering::Relaxed) {
                thread::sleep(SHUTDOWN_POLL_INTERVAL);
            }
            info!("CPAL output stream stopped");
        });

        let output_stream = OutputStream {
            device: device_name,
            shutdown,
            output_thread: Some(output_thread),
        };
        match started_rx.recv() {
            Ok(Ok(())) => Ok(output_stream),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("output thread exited before the stream started".into()),
        }
    }
}
