//! Immutable training snapshots for visualization and persistence

use crate::feature_extractor::FeatureVector;
use crate::som::{SomGrid, TrainingState};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// Fixed-capacity ring of recent feature vectors
#[derive(Debug, Clone)]
pub struct FeatureHistory {
    capacity: usize,
    items: VecDeque<FeatureVector>,
}

impl FeatureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, features: FeatureVector) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(features);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<FeatureVector> {
        self.items.iter().copied().collect()
    }
}

/// Copy of the map and recent inputs after a training step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Training steps completed
    pub step: u64,

    /// Winner of the most recent step
    pub winner: Option<(usize, usize)>,

    /// Learning rate for the next step
    pub learning_rate: f64,

    /// Neighborhood radius for the next step
    pub radius: f64,

    /// R×C×D weights
    pub grid: SomGrid,

    /// Recent feature vectors, oldest first
    pub history: Vec<FeatureVector>,
}

impl Snapshot {
    pub fn capture(
        grid: &SomGrid,
        state: TrainingState,
        winner: Option<(usize, usize)>,
        history: &FeatureHistory,
    ) -> Self {
        Self {
            step: state.step,
            winner,
            learning_rate: state.learning_rate,
            radius: state.radius,
            grid: grid.clone(),
            history: history.to_vec(),
        }
    }

    /// R×C map of one feature component; component 0 is the low band
    pub fn component_plane(&self, component: usize) -> Option<Vec<Vec<f64>>> {
        self.grid.component_plane(component)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "step": self.step,
            "winner": self.winner,
            "learning_rate": self.learning_rate,
            "radius": self.radius,
            "rows": self.grid.rows(),
            "cols": self.grid.cols(),
            "dim": self.grid.dim(),
            "weights": self.grid.to_nested(),
            "history": self.history,
        })
    }
}

/// Receiving side handed to visualization consumers
pub type SnapshotReceiver = watch::Receiver<Option<Arc<Snapshot>>>;

/// Latest-value snapshot channel. Publishing never blocks and works with no
/// subscribers; slow readers simply observe fewer snapshots.
pub struct SnapshotPublisher {
    sender: watch::Sender<Option<Arc<Snapshot>>>,
    published: u64,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender,
            published: 0,
        }
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.sender.subscribe()
    }

    pub fn publish(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.sender.send_replace(Some(snapshot.clone()));
        self.published = self.published.saturating_add(1);
        snapshot
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.sender.borrow().clone()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
