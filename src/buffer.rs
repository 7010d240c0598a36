//! Experience replay

use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{Result, SamplerError};

/// One step of experience.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_observation: Vec<f32>,
    pub done: bool,
}

/// A sampled batch, stored as parallel columns aligned by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub next_observations: Vec<Vec<f32>>,
    pub dones: Vec<bool>,
}

impl Batch {
    fn with_capacity(n: usize) -> Self {
        Self {
            observations: Vec::with_capacity(n),
            actions: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            next_observations: Vec::with_capacity(n),
            dones: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn push(&mut self, transition: &Transition) {
        self.observations.push(transition.observation.clone());
        self.actions.push(transition.action);
        self.rewards.push(transition.reward);
        self.next_observations
            .push(transition.next_observation.clone());
        self.dones.push(transition.done);
    }
}

/// Fixed-capacity ring of the most recent transitions.
///
/// Once full, every `add` evicts the oldest transition. Sampling is uniform
/// and with replacement.
#[derive(Debug)]
pub struct ReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        }
    }

    pub fn add(
        &mut self,
        observation: Vec<f32>,
        action: usize,
        reward: f32,
        next_observation: Vec<f32>,
        done: bool,
    ) {
        self.push(Transition {
            observation,
            action,
            reward,
            next_observation,
            done,
        });
    }

    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() >= self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Draws `batch_size` transitions independently and uniformly, with
    /// replacement.
    pub fn sample(&mut self, batch_size: usize) -> Result<Batch> {
        let available = self.transitions.len();
        if batch_size > available {
            return Err(SamplerError::InsufficientData {
                requested: batch_size,
                available,
            });
        }

        let mut batch = Batch::with_capacity(batch_size);
        for _ in 0..batch_size {
            let idx = self.rng.random_range(0..available);
            batch.push(&self.transitions[idx]);
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Oldest-first view of the current contents.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }
}
