//! Run configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SamplerError};
use crate::schedule::LinearSchedule;

/// Temporal-difference loss applied to the online values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TdLoss {
    /// Quadratic within a unit error, linear beyond it.
    Huber,
    Mse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimiserKind {
    Adam,
    #[serde(rename = "adamw")]
    AdamW,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// Discount factor.
    pub gamma: f64,
    pub loss: TdLoss,
    pub optimiser: OptimiserKind,
    /// Clip the global gradient norm to this value before each step.
    pub grad_norm_clip: Option<f32>,
    /// Seeds the exploration coin.
    pub seed: Option<u64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            learning_rate: 1e-3,
            gamma: 1.0,
            loss: TdLoss::Huber,
            optimiser: OptimiserKind::Adam,
            grad_norm_clip: None,
            seed: None,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(invalid(format!("gamma {} outside [0, 1]", self.gamma)));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.hidden_layers.contains(&0) {
            return Err(invalid("hidden layers must be non-empty".into()));
        }
        if let Some(clip) = self.grad_norm_clip {
            if !(clip > 0.0) {
                return Err(invalid(format!("grad_norm_clip must be positive, got {clip}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub buffer_capacity: usize,
    pub exploration_steps: usize,
    pub exploration_initial: f64,
    pub exploration_final: f64,
    /// Learning starts once the global step exceeds this threshold.
    pub learning_starts: usize,
    pub target_update_interval: usize,
    pub batch_size: usize,
    pub num_episodes: usize,
    /// Report every N accumulator entries.
    pub report_every: usize,
    /// Completed episodes averaged into the reported mean reward.
    pub report_window: usize,
    pub eval_explore_prob: f64,
    pub render_eval: bool,
    /// Seeds replay sampling.
    pub seed: Option<u64>,
    pub estimator: EstimatorConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 50_000,
            exploration_steps: 1000,
            exploration_initial: 1.0,
            exploration_final: 0.02,
            learning_starts: 1000,
            target_update_interval: 1000,
            batch_size: 32,
            num_episodes: 100,
            report_every: 10,
            report_window: 100,
            eval_explore_prob: 0.9,
            render_eval: false,
            seed: None,
            estimator: EstimatorConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn exploration(&self) -> LinearSchedule {
        LinearSchedule::new(
            self.exploration_steps,
            self.exploration_initial,
            self.exploration_final,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(invalid("buffer_capacity must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be positive".into()));
        }
        if self.buffer_capacity < self.batch_size {
            return Err(invalid(format!(
                "buffer_capacity {} cannot hold a batch of {}",
                self.buffer_capacity, self.batch_size
            )));
        }
        if self.target_update_interval == 0 {
            return Err(invalid("target_update_interval must be positive".into()));
        }
        if self.report_every == 0 || self.report_window == 0 {
            return Err(invalid("report_every and report_window must be positive".into()));
        }
        for (name, p) in [
            ("exploration_initial", self.exploration_initial),
            ("exploration_final", self.exploration_final),
            ("eval_explore_prob", self.eval_explore_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!("{name} {p} outside [0, 1]")));
            }
        }
        if self.eval_explore_prob == 0.0 {
            // a fully greedy policy can cycle forever on a deterministic environment
            return Err(invalid("eval_explore_prob must be non-zero".into()));
        }
        if self.learning_starts < self.batch_size {
            warn!(
                learning_starts = self.learning_starts,
                batch_size = self.batch_size,
                "learning waits until the buffer holds a full batch"
            );
        }
        self.estimator.validate()
    }
}

fn invalid(msg: String) -> SamplerError {
    SamplerError::InvalidConfig(msg)
}
