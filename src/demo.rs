//! Small built-in environment for the command-line front end
//!
//! A clustered, piecewise-constant signal lives on a path graph. The agent
//! picks nodes to sample until its budget is spent; unsampled nodes are
//! reconstructed from the nearest sampled node and scored by normalised mean
//! squared error.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    env::{Environment, ObservationSpace, Step},
    error::{Result, SamplerError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSignalConfig {
    pub cluster_sizes: Vec<usize>,
    /// Samples per episode.
    pub budget: usize,
    /// Draw a fresh signal on every reset.
    pub resample_signal: bool,
    pub seed: Option<u64>,
}

impl Default for PathSignalConfig {
    fn default() -> Self {
        Self {
            cluster_sizes: vec![10, 20, 30, 40],
            budget: 10,
            resample_signal: true,
            seed: None,
        }
    }
}

pub struct PathSignalEnv {
    config: PathSignalConfig,
    signal: Vec<f32>,
    sampled: Vec<f32>,
    samples_taken: usize,
    nmse: f64,
    rng: StdRng,
}

impl PathSignalEnv {
    pub fn new(config: PathSignalConfig) -> Result<Self> {
        let nodes: usize = config.cluster_sizes.iter().sum();
        if nodes == 0 || config.budget == 0 {
            return Err(SamplerError::InvalidConfig(
                "path signal needs at least one node and a positive budget".into(),
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut env = Self {
            signal: Vec::new(),
            sampled: vec![0.0; nodes],
            samples_taken: 0,
            nmse: 1.0,
            config,
            rng,
        };
        env.draw_signal();
        Ok(env)
    }

    fn draw_signal(&mut self) {
        self.signal.clear();
        for &size in &self.config.cluster_sizes {
            let level: f32 = self.rng.random_range(-1.0..1.0);
            self.signal.extend(std::iter::repeat_n(level, size));
        }
    }

    /// Nearest-sample reconstruction; ties go to the left neighbour.
    fn reconstruct(&self) -> Vec<f32> {
        let n = self.signal.len();
        let mut left: Vec<Option<usize>> = vec![None; n];
        let mut last = None;
        for i in 0..n {
            if self.sampled[i] == 1.0 {
                last = Some(i);
            }
            left[i] = last;
        }

        let mut out = vec![0.0; n];
        let mut right = None;
        for i in (0..n).rev() {
            if self.sampled[i] == 1.0 {
                right = Some(i);
            }
            let source = match (left[i], right) {
                (Some(l), Some(r)) => Some(if i - l <= r - i { l } else { r }),
                (l, r) => l.or(r),
            };
            out[i] = source.map_or(0.0, |s| self.signal[s]);
        }
        out
    }

    fn compute_nmse(&self) -> f64 {
        let estimate = self.reconstruct();
        let err: f64 = self
            .signal
            .iter()
            .zip(&estimate)
            .map(|(&x, &y)| ((x - y) as f64).powi(2))
            .sum();
        let energy: f64 = self.signal.iter().map(|&x| (x as f64).powi(2)).sum();
        if energy == 0.0 { err } else { err / energy }
    }
}

impl Environment for PathSignalEnv {
    fn observation_space(&self) -> ObservationSpace {
        ObservationSpace::MultiBinary {
            n: self.signal.len(),
        }
    }

    fn num_actions(&self) -> usize {
        self.signal.len()
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        if self.config.resample_signal {
            self.draw_signal();
        }
        self.sampled.iter_mut().for_each(|s| *s = 0.0);
        self.samples_taken = 0;
        self.nmse = self.compute_nmse();
        Ok(self.sampled.clone())
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        let num_actions = self.num_actions();
        if action >= num_actions {
            return Err(SamplerError::InvalidAction { action, num_actions });
        }
        self.sampled[action] = 1.0;
        self.samples_taken += 1;

        let before = self.nmse;
        self.nmse = self.compute_nmse();
        let done = self.samples_taken >= self.config.budget;

        let mut step = Step::new(self.sampled.clone(), (before - self.nmse) as f32, done);
        step.info
            .insert("nmse".into(), serde_json::Value::from(self.nmse));
        Ok(step)
    }

    fn quality_metric(&self) -> f64 {
        self.nmse
    }
}
