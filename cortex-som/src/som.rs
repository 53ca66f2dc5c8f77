//! Online self-organizing map
//!
//! The map trains one sample at a time on an unbounded stream, so the
//! learning rate and neighborhood radius decay toward positive floors instead
//! of reaching zero at a fixed iteration count.

use crate::config::{validate_schedule, SomConfig};
use crate::error::{CortexError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// R×C grid of D-dimensional weight vectors, stored row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSomGrid")]
pub struct SomGrid {
    rows: usize,
    cols: usize,
    dim: usize,
    weights: Vec<f64>,
}

/// Unchecked wire form; deserialized grids go through `SomGrid::new`
#[derive(Deserialize)]
struct RawSomGrid {
    rows: usize,
    cols: usize,
    dim: usize,
    weights: Vec<f64>,
}

impl TryFrom<RawSomGrid> for SomGrid {
    type Error = CortexError;

    fn try_from(raw: RawSomGrid) -> Result<Self> {
        Self::new(raw.rows, raw.cols, raw.dim, raw.weights)
    }
}

impl SomGrid {
    /// Build a grid from flat row-major weights
    pub fn new(rows: usize, cols: usize, dim: usize, weights: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 || dim == 0 {
            return Err(CortexError::Config(format!(
                "Grid dimensions must be non-zero, got {}x{}x{}",
                rows, cols, dim
            )));
        }

        let expected = rows * cols * dim;
        if weights.len() != expected {
            return Err(CortexError::Dimension {
                expected,
                actual: weights.len(),
            });
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(CortexError::Config("Grid contains non-finite weights".to_string()));
        }

        Ok(Self {
            rows,
            cols,
            dim,
            weights,
        })
    }

    /// Build a grid from per-neuron vectors, `rows[r][c]` being one neuron
    pub fn from_nested(neurons: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let rows = neurons.len();
        let cols = neurons.first().map(|r| r.len()).unwrap_or(0);
        let dim = neurons
            .first()
            .and_then(|r| r.first())
            .map(|w| w.len())
            .unwrap_or(0);

        let mut weights = Vec::with_capacity(rows * cols * dim);
        for row in neurons {
            if row.len() != cols {
                return Err(CortexError::Dimension {
                    expected: cols,
                    actual: row.len(),
                });
            }
            for neuron in row {
                if neuron.len() != dim {
                    return Err(CortexError::Dimension {
                        expected: dim,
                        actual: neuron.len(),
                    });
                }
                weights.extend(neuron);
            }
        }

        Self::new(rows, cols, dim, weights)
    }

    /// Uniform weights in `[0, 1)` from a seeded generator
    pub fn random(rows: usize, cols: usize, dim: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights = (0..rows * cols * dim).map(|_| rng.gen::<f64>()).collect();
        Self::new(rows, cols, dim, weights)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of neurons
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight vector of neuron `(row, col)`.
    ///
    /// Panics if either coordinate is outside the grid.
    pub fn weight(&self, row: usize, col: usize) -> &[f64] {
        assert!(
            row < self.rows && col < self.cols,
            "neuron ({}, {}) outside {}x{} grid",
            row,
            col,
            self.rows,
            self.cols
        );
        let start = (row * self.cols + col) * self.dim;
        &self.weights[start..start + self.dim]
    }

    /// Weight vector of neuron `(row, col)`, `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<&[f64]> {
        (row < self.rows && col < self.cols).then(|| self.weight(row, col))
    }

    /// Flat row-major weights, shape R×C×D
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Weights as nested `[row][col][d]`
    pub fn to_nested(&self) -> Vec<Vec<Vec<f64>>> {
        (0..self.rows)
            .map(|r| (0..self.cols).map(|c| self.weight(r, c).to_vec()).collect())
            .collect()
    }

    /// R×C slice of a single weight component
    pub fn component_plane(&self, component: usize) -> Option<Vec<Vec<f64>>> {
        if component >= self.dim {
            return None;
        }
        Some(
            (0..self.rows)
                .map(|r| {
                    (0..self.cols)
                        .map(|c| self.weight(r, c)[component])
                        .collect()
                })
                .collect(),
        )
    }

    fn neurons(&self) -> impl Iterator<Item = ((usize, usize), &[f64])> {
        let cols = self.cols;
        self.weights
            .chunks_exact(self.dim)
            .enumerate()
            .map(move |(i, w)| ((i / cols, i % cols), w))
    }
}

/// `floor + (initial - floor) * exp(-t / time_constant)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDecaySchedule")]
pub struct DecaySchedule {
    pub initial: f64,
    pub floor: f64,
    pub time_constant: f64,
}

#[derive(Deserialize)]
struct RawDecaySchedule {
    initial: f64,
    floor: f64,
    time_constant: f64,
}

impl TryFrom<RawDecaySchedule> for DecaySchedule {
    type Error = CortexError;

    fn try_from(raw: RawDecaySchedule) -> Result<Self> {
        Self::new(raw.initial, raw.floor, raw.time_constant)
    }
}

impl DecaySchedule {
    /// Requires `0 < floor <= initial` and a positive time constant
    pub fn new(initial: f64, floor: f64, time_constant: f64) -> Result<Self> {
        validate_schedule("decay", initial, floor, time_constant).map_err(CortexError::Config)?;
        Ok(Self {
            initial,
            floor,
            time_constant,
        })
    }

    /// Value at step `t`. Never below `floor`.
    pub fn value(&self, t: u64) -> f64 {
        let decayed = (self.initial - self.floor) * (-(t as f64) / self.time_constant).exp();
        (self.floor + decayed).max(self.floor)
    }
}

/// Step counter plus the hyperparameters for the next step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub step: u64,
    pub learning_rate: f64,
    pub radius: f64,
}

/// What a single training step did
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    /// Best matching neuron `(row, col)`
    pub winner: (usize, usize),

    /// Steps completed, including this one
    pub step: u64,

    /// Learning rate applied in this step
    pub learning_rate: f64,

    /// Radius applied in this step
    pub radius: f64,
}

/// Gaussian neighborhood weight between two grid coordinates
pub fn neighborhood_weight(winner: (usize, usize), neuron: (usize, usize), radius: f64) -> f64 {
    let dr = winner.0 as f64 - neuron.0 as f64;
    let dc = winner.1 as f64 - neuron.1 as f64;
    let dist2 = dr * dr + dc * dc;
    (-dist2 / (2.0 * radius * radius)).exp()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Owns the grid and its training state
pub struct SomEngine {
    grid: SomGrid,
    state: TrainingState,
    learning_rate: DecaySchedule,
    radius: DecaySchedule,
}

impl SomEngine {
    /// Create an engine with seeded random weights
    pub fn new(config: &SomConfig) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;
        let grid = SomGrid::random(config.rows, config.cols, config.dim, config.seed)?;
        info!(
            "SOM initialized: {}x{} neurons, dim {}, seed {}",
            config.rows, config.cols, config.dim, config.seed
        );
        Self::with_grid(config, grid)
    }

    /// Create an engine around explicit starting weights
    pub fn with_grid(config: &SomConfig, grid: SomGrid) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;

        if grid.rows() != config.rows || grid.cols() != config.cols {
            return Err(CortexError::Config(format!(
                "Grid is {}x{}, configuration expects {}x{}",
                grid.rows(),
                grid.cols(),
                config.rows,
                config.cols
            )));
        }

        if grid.dim() != config.dim {
            return Err(CortexError::Dimension {
                expected: config.dim,
                actual: grid.dim(),
            });
        }

        let learning_rate = DecaySchedule::new(
            config.initial_learning_rate,
            config.min_learning_rate,
            config.learning_rate_decay,
        )?;
        let radius = DecaySchedule::new(
            config.initial_radius,
            config.min_radius,
            config.radius_decay,
        )?;

        Ok(Self {
            grid,
            state: TrainingState {
                step: 0,
                learning_rate: learning_rate.value(0),
                radius: radius.value(0),
            },
            learning_rate,
            radius,
        })
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.grid.dim() {
            return Err(CortexError::Dimension {
                expected: self.grid.dim(),
                actual: input.len(),
            });
        }
        if input.iter().any(|v| !v.is_finite()) {
            return Err(CortexError::Chunk("Non-finite feature value".to_string()));
        }
        Ok(())
    }

    /// Closest neuron; ties go to the lowest row, then the lowest column
    pub fn winner(&self, input: &[f64]) -> Result<(usize, usize)> {
        self.check_input(input)?;
        Ok(self.best_match(input).0)
    }

    fn best_match(&self, input: &[f64]) -> ((usize, usize), f64) {
        let mut best = ((0, 0), f64::INFINITY);
        for (coord, weight) in self.grid.neurons() {
            let d = squared_distance(weight, input);
            if d < best.1 {
                best = (coord, d);
            }
        }
        best
    }

    /// Euclidean distance from `input` to its winner
    pub fn quantization_error(&self, input: &[f64]) -> Result<f64> {
        self.check_input(input)?;
        Ok(self.best_match(input).1.sqrt())
    }

    /// One online update, then advance the schedules
    pub fn train_step(&mut self, input: &[f64]) -> Result<TrainOutcome> {
        self.check_input(input)?;

        let (winner, _) = self.best_match(input);
        let alpha = self.state.learning_rate;
        let sigma = self.state.radius;
        let (cols, dim) = (self.grid.cols, self.grid.dim);

        for (i, weight) in self.grid.weights.chunks_exact_mut(dim).enumerate() {
            let h = neighborhood_weight(winner, (i / cols, i % cols), sigma);
            let rate = alpha * h;
            for (w, x) in weight.iter_mut().zip(input) {
                *w += rate * (x - *w);
            }
        }

        self.state.step += 1;
        self.state.learning_rate = self.learning_rate.value(self.state.step);
        self.state.radius = self.radius.value(self.state.step);

        debug!(
            "SOM step {}: winner {:?}, alpha {:.4}, sigma {:.4}",
            self.state.step, winner, alpha, sigma
        );

        Ok(TrainOutcome {
            winner,
            step: self.state.step,
            learning_rate: alpha,
            radius: sigma,
        })
    }

    pub fn grid(&self) -> &SomGrid {
        &self.grid
    }

    pub fn into_grid(self) -> SomGrid {
        self.grid
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn step(&self) -> u64 {
        self.state.step
    }

    /// Learning rate the next step will use
    pub fn learning_rate(&self) -> f64 {
        self.state.learning_rate
    }

    /// Radius the next step will use
    pub fn radius(&self) -> f64 {
        self.state.radius
    }

    pub fn learning_rate_schedule(&self) -> DecaySchedule {
        self.learning_rate
    }

    pub fn radius_schedule(&self) -> DecaySchedule {
        self.radius
    }
}
