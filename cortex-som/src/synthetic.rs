//! Deterministic tone producer for runs without a microphone

use crate::config::FeatureConfig;
use crate::pipeline::ShutdownSignal;
use crate::streaming::{PushOutcome, StreamBuffer};
use std::f64::consts::PI;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// Cycles through a list of tones, holding each for a number of chunks
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    sample_rate: u32,
    chunk_size: usize,
    /// `(frequency Hz, amplitude)`
    tones: Vec<(f64, f32)>,
    chunks_per_tone: u64,
    chunk_index: u64,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(config: &FeatureConfig, tones: Vec<(f64, f32)>, chunks_per_tone: u64) -> Self {
        Self {
            sample_rate: config.sample_rate,
            chunk_size: config.chunk_size,
            tones,
            chunks_per_tone: chunks_per_tone.max(1),
            chunk_index: 0,
            phase: 0.0,
        }
    }

    /// A low hum, a speech-range tone, and silence
    pub fn low_mid_alternation(config: &FeatureConfig) -> Self {
        Self::new(config, vec![(110.0, 0.6), (1500.0, 0.3), (0.0, 0.0)], 8)
    }

    /// Next chunk of samples
    pub fn next_chunk(&mut self) -> Vec<f32> {
        let (freq, amplitude) = if self.tones.is_empty() {
            (0.0, 0.0)
        } else {
            let slot = (self.chunk_index / self.chunks_per_tone) as usize % self.tones.len();
            self.tones[slot]
        };
        self.chunk_index += 1;

        let step = 2.0 * PI * freq / self.sample_rate as f64;
        (0..self.chunk_size)
            .map(|_| {
                let sample = amplitude * self.phase.sin() as f32;
                self.phase = (self.phase + step) % (2.0 * PI);
                sample
            })
            .collect()
    }
}

impl Iterator for ToneGenerator {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_chunk())
    }
}

/// Feed generated chunks into `buffer` on a background thread.
///
/// Stops after `max_chunks` (if set) or when `shutdown` fires, then closes the
/// buffer. `pacing` sleeps between chunks to mimic a real-time device.
pub fn spawn_tone_source(
    mut generator: ToneGenerator,
    buffer: Arc<StreamBuffer>,
    shutdown: ShutdownSignal,
    max_chunks: Option<u64>,
    pacing: Option<Duration>,
) -> std::io::Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("cortex-tone-source".to_string())
        .spawn(move || {
            info!("Tone source started");
            let mut pushed = 0u64;

            while !shutdown.is_triggered() && max_chunks.map_or(true, |max| pushed < max) {
                if buffer.push(generator.next_chunk()) == PushOutcome::Closed {
                    debug!("Buffer closed under the tone source");
                    break;
                }
                pushed += 1;

                if let Some(delay) = pacing {
                    std::thread::sleep(delay);
                }
            }

            buffer.close();
            info!("Tone source stopped after {} chunks", pushed);
            pushed
        })
}
