//! Microphone producer: cpal input stream → fixed-size chunks → StreamBuffer

use crate::config::FeatureConfig;
use crate::error::{CortexError, Result};
use crate::pipeline::ShutdownSignal;
use crate::streaming::{PushOutcome, StreamBuffer};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, StreamConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Re-slices interleaved device callbacks into mono chunks of a fixed length
struct Chunker {
    channels: usize,
    chunk_size: usize,
    pending: Vec<f32>,
    buffer: Arc<StreamBuffer>,
}

impl Chunker {
    fn new(channels: u16, chunk_size: usize, buffer: Arc<StreamBuffer>) -> Self {
        Self {
            channels: channels.max(1) as usize,
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            buffer,
        }
    }

    fn feed(&mut self, frames: impl Iterator<Item = f32>) {
        let channels = self.channels;
        let mut acc = 0.0f32;
        for (i, sample) in frames.enumerate() {
            // Non-finite device output is zeroed rather than forwarded
            acc += if sample.is_finite() { sample } else { 0.0 };
            if (i + 1) % channels != 0 {
                continue;
            }
            self.pending.push(acc / channels as f32);
            acc = 0.0;

            if self.pending.len() == self.chunk_size {
                let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
                if self.buffer.push(chunk) == PushOutcome::DroppedOldest {
                    debug!("Training is behind capture, oldest chunk dropped");
                }
            }
        }
    }
}

/// Live microphone feeding a [`StreamBuffer`]
pub struct AudioCapture {
    shutdown: ShutdownSignal,
    thread: Option<JoinHandle<()>>,
}

impl AudioCapture {
    /// Open the input device and start pushing chunks.
    ///
    /// The cpal stream lives on its own thread because it is not `Send`. On
    /// shutdown that thread drops the stream and closes the buffer.
    pub fn start(
        config: &FeatureConfig,
        device_name: Option<String>,
        buffer: Arc<StreamBuffer>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;

        let sample_rate = config.sample_rate;
        let chunk_size = config.chunk_size;
        let thread_shutdown = shutdown.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let thread = std::thread::Builder::new()
            .name("cortex-capture".to_string())
            .spawn(move || {
                let stream = match open_stream(
                    device_name.as_deref(),
                    sample_rate,
                    chunk_size,
                    buffer.clone(),
                    thread_shutdown.clone(),
                ) {
                    Ok(stream) => stream,
                    Err(e) => {
                        buffer.close();
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!("Audio capture started");

                while !thread_shutdown.is_triggered() {
                    std::thread::sleep(Duration::from_millis(20));
                }

                drop(stream);
                buffer.close();
                info!("Audio capture stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shutdown,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CortexError::Capture("Capture thread exited during startup".to_string())),
        }
    }

    /// Stop feeding and close the buffer
    pub fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }

    /// Names of available input devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CortexError::Device(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn find_device(host: &Host, name: Option<&str>) -> Result<Device> {
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| CortexError::Device("No input device available".to_string())),
        Some(name) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| CortexError::Device(format!("Failed to enumerate devices: {}", e)))?;
            devices
                .find(|d| d.name().map(|n| n == name || n.contains(name)).unwrap_or(false))
                .ok_or_else(|| CortexError::Device(format!("Input device '{}' not found", name)))
        }
    }
}

fn open_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    chunk_size: usize,
    buffer: Arc<StreamBuffer>,
    shutdown: ShutdownSignal,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = find_device(&host, device_name)?;

    let default = device
        .default_input_config()
        .map_err(|e| CortexError::Device(format!("Failed to query input config: {}", e)))?;

    let config = StreamConfig {
        channels: default.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let mut chunker = Chunker::new(config.channels, chunk_size, buffer);

    let on_error = move |err: cpal::StreamError| {
        error!("Audio stream error: {}", err);
        shutdown.trigger();
    };

    let stream = match default.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| chunker.feed(data.iter().copied()),
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                chunker.feed(data.iter().map(|&s| s as f32 / 32768.0))
            },
            on_error,
            None,
        ),
        other => {
            return Err(CortexError::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| CortexError::Capture(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| CortexError::Capture(format!("Failed to start stream: {}", e)))?;

    Ok(stream)
}
