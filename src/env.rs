//! Environment capability consumed by the training and evaluation loops

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Shape of the observations an environment produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationSpace {
    /// Flat vector of `n` flags, each 0 or 1.
    MultiBinary { n: usize },
    /// Real-valued box; observations arrive flattened in row-major order.
    Box { shape: Vec<usize> },
}

impl ObservationSpace {
    /// Length of a flattened observation.
    pub fn flat_dim(&self) -> usize {
        match self {
            ObservationSpace::MultiBinary { n } => *n,
            ObservationSpace::Box { shape } => shape.iter().product(),
        }
    }
}

/// Outcome of a single environment step.
#[derive(Debug, Clone)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: serde_json::Map<String, serde_json::Value>,
}

impl Step {
    pub fn new(observation: Vec<f32>, reward: f32, done: bool) -> Self {
        Self {
            observation,
            reward,
            done,
            info: serde_json::Map::new(),
        }
    }
}

pub trait Environment {
    fn observation_space(&self) -> ObservationSpace;

    /// Size of the discrete action space.
    fn num_actions(&self) -> usize;

    fn reset(&mut self) -> Result<Vec<f32>>;

    fn step(&mut self, action: usize) -> Result<Step>;

    /// Task-specific reconstruction quality of the current episode.
    fn quality_metric(&self) -> f64;

    fn render(&self) -> Result<()> {
        Ok(())
    }
}
