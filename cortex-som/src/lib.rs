//! cortex-som: live tonotopic map training
//!
//! Turns a continuous audio stream into a self-organizing map:
//! - Bounded, drop-oldest buffer between capture and processing
//! - Per-chunk spectral band energies and intensity via FFT
//! - Online SOM training with decay schedules that never reach zero
//! - Immutable snapshots published for visualization and persistence

pub mod error;
pub mod config;
pub mod streaming;
pub mod feature_extractor;
pub mod som;
pub mod snapshot;
pub mod pipeline;
pub mod synthetic;
#[cfg(feature = "microphone")]
pub mod audio_capture;

pub use error::{CortexError, Result};
pub use config::{CortexConfig, FeatureConfig, SomConfig, StreamConfig};
pub use streaming::{AudioChunk, BufferStats, PopResult, PushOutcome, StreamBuffer};
pub use feature_extractor::{FeatureExtractor, FeatureVector, ENERGY_FLOOR};
pub use som::{neighborhood_weight, DecaySchedule, SomEngine, SomGrid, TrainOutcome, TrainingState};
pub use snapshot::{FeatureHistory, Snapshot, SnapshotPublisher, SnapshotReceiver};
pub use pipeline::{
    Coordinator, PipelineHandle, PipelineReport, PipelineState, PipelineStats, ShutdownSignal,
    StopReason,
};
pub use synthetic::{spawn_tone_source, ToneGenerator};
#[cfg(feature = "microphone")]
pub use audio_capture::AudioCapture;
