//! Consume → extract → train → publish loop

use crate::config::CortexConfig;
use crate::error::{CortexError, Result};
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::snapshot::{FeatureHistory, Snapshot, SnapshotPublisher, SnapshotReceiver};
use crate::som::{SomEngine, SomGrid, TrainOutcome};
use crate::streaming::{AudioChunk, PopResult, StreamBuffer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Why the coordinator left `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The producer closed the buffer and every pending chunk was consumed
    BufferClosed,
    /// The shared shutdown flag was raised
    Cancelled,
}

/// Cooperative termination flag shared by producer and consumer
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Chunks that produced a training step
    pub processed: u64,
    /// Chunks skipped after an extraction or training failure
    pub failed: u64,
    /// Chunks the buffer discarded on overflow
    pub dropped: u64,
    /// Chunks left queued when cancellation stopped the loop
    pub abandoned: u64,
}

/// Handed to the persistence side once the coordinator is `Stopped`
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub final_weights: SomGrid,
    pub final_snapshot: Arc<Snapshot>,
    pub stats: PipelineStats,
    pub reason: StopReason,
}

/// Single owner of the SOM; drives training from the stream buffer
pub struct Coordinator {
    buffer: Arc<StreamBuffer>,
    extractor: FeatureExtractor,
    engine: SomEngine,
    history: FeatureHistory,
    publisher: SnapshotPublisher,
    state: Arc<RwLock<PipelineState>>,
    shutdown: ShutdownSignal,
    pop_timeout: Duration,
    last_winner: Option<(usize, usize)>,
    stats: PipelineStats,
}

impl Coordinator {
    /// Build a coordinator with a freshly seeded map
    pub fn new(
        config: &CortexConfig,
        buffer: Arc<StreamBuffer>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;
        let engine = SomEngine::new(&config.som)?;
        Self::with_engine(config, engine, buffer, shutdown)
    }

    /// Build a coordinator around an existing engine
    pub fn with_engine(
        config: &CortexConfig,
        engine: SomEngine,
        buffer: Arc<StreamBuffer>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;

        if engine.grid().dim() != FeatureVector::DIM {
            return Err(CortexError::Dimension {
                expected: FeatureVector::DIM,
                actual: engine.grid().dim(),
            });
        }

        let extractor = FeatureExtractor::new(config.features.clone())?;

        Ok(Self {
            buffer,
            extractor,
            engine,
            history: FeatureHistory::new(config.history_capacity),
            publisher: SnapshotPublisher::new(),
            state: Arc::new(RwLock::new(PipelineState::Idle)),
            shutdown,
            pop_timeout: Duration::from_millis(config.stream.pop_timeout_ms),
            last_winner: None,
            stats: PipelineStats::default(),
        })
    }

    /// Receiver for published snapshots
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.publisher.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn engine(&self) -> &SomEngine {
        &self.engine
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self.state.write();
        debug!("Pipeline {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Extract, train and publish for one chunk
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<TrainOutcome> {
        let features = self.extractor.extract(chunk)?;
        let outcome = self.engine.train_step(&features.to_array())?;

        self.history.push(features);
        self.last_winner = Some(outcome.winner);
        self.stats.processed = self.stats.processed.saturating_add(1);
        self.publish();

        Ok(outcome)
    }

    fn publish(&mut self) -> Arc<Snapshot> {
        let snapshot = Snapshot::capture(
            self.engine.grid(),
            self.engine.state(),
            self.last_winner,
            &self.history,
        );
        self.publisher.publish(snapshot)
    }

    /// Run until the buffer closes or shutdown is signalled
    pub fn run(mut self) -> PipelineReport {
        self.set_state(PipelineState::Running);
        info!(
            "Pipeline running: {}x{} map, buffer capacity {}",
            self.engine.grid().rows(),
            self.engine.grid().cols(),
            self.buffer.capacity()
        );

        let reason = loop {
            if self.shutdown.is_triggered() {
                break StopReason::Cancelled;
            }

            match self.buffer.pop(self.pop_timeout) {
                PopResult::Chunk(chunk) => {
                    if let Err(e) = self.process_chunk(&chunk) {
                        self.stats.failed = self.stats.failed.saturating_add(1);
                        warn!("Skipping chunk {}: {}", chunk.sequence(), e);
                    }
                }
                PopResult::Empty => continue,
                PopResult::Closed => break StopReason::BufferClosed,
            }
        };

        self.set_state(PipelineState::Stopping);
        info!("Pipeline stopping: {:?}", reason);

        if reason == StopReason::Cancelled {
            self.buffer.close();
            self.stats.abandoned = self.buffer.len() as u64;
        }
        self.stats.dropped = self.buffer.stats().dropped;

        let final_snapshot = self.publish();
        self.set_state(PipelineState::Stopped);

        info!(
            "Pipeline stopped after {} steps ({} processed, {} failed, {} dropped, {} abandoned)",
            self.engine.step(),
            self.stats.processed,
            self.stats.failed,
            self.stats.dropped,
            self.stats.abandoned
        );

        PipelineReport {
            final_weights: self.engine.into_grid(),
            final_snapshot,
            stats: self.stats,
            reason,
        }
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> Result<PipelineHandle> {
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let receiver = self.subscribe();

        let join = std::thread::Builder::new()
            .name("cortex-coordinator".to_string())
            .spawn(move || self.run())?;

        Ok(PipelineHandle {
            state,
            shutdown,
            receiver,
            join,
        })
    }
}

/// Control handle for a coordinator running on its own thread
pub struct PipelineHandle {
    state: Arc<RwLock<PipelineState>>,
    shutdown: ShutdownSignal,
    receiver: SnapshotReceiver,
    join: JoinHandle<PipelineReport>,
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.receiver.clone()
    }

    /// Request cooperative shutdown
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the coordinator to reach `Stopped`
    pub fn join(self) -> Result<PipelineReport> {
        self.join
            .join()
            .map_err(|_| CortexError::Pipeline("coordinator thread panicked".to_string()))
    }
}
