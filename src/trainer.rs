//! Episode-driven training loop

use tracing::{debug, info};

use crate::{
    buffer::ReplayBuffer,
    config::TrainerConfig,
    encoder::{encoder_for, ObservationEncoder},
    env::Environment,
    error::{Result, SamplerError},
    estimator::ValueEstimator,
    report::{EpisodeReport, Reporter},
    schedule::{LinearSchedule, Schedule},
};

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    /// One total per episode; the last entry is the episode started after the
    /// final completed one and is always zero.
    pub episode_rewards: Vec<f64>,
    pub global_steps: usize,
    pub completed_episodes: usize,
    pub updates: usize,
    pub syncs: usize,
    pub last_loss: Option<f32>,
}

pub struct Trainer<R> {
    config: TrainerConfig,
    exploration: LinearSchedule,
    buffer: ReplayBuffer,
    reporter: R,
}

impl<R: Reporter> Trainer<R> {
    pub fn new(config: TrainerConfig, reporter: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exploration: config.exploration(),
            buffer: Self::fresh_buffer(&config),
            config,
            reporter,
        })
    }

    fn fresh_buffer(config: &TrainerConfig) -> ReplayBuffer {
        match config.seed {
            Some(seed) => ReplayBuffer::with_seed(config.buffer_capacity, seed),
            None => ReplayBuffer::new(config.buffer_capacity),
        }
    }

    /// Replay buffer of the most recent `train` call.
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// Runs `num_episodes` complete episodes.
    ///
    /// Episode length is decided by the environment; an environment that never
    /// reports `done` keeps this call running.
    pub fn train<E, V>(&mut self, env: &mut E, estimator: &mut V) -> Result<TrainingSummary>
    where
        E: Environment + ?Sized,
        V: ValueEstimator + ?Sized,
    {
        let num_actions = env.num_actions();
        if estimator.num_actions() != num_actions {
            return Err(SamplerError::ActionSpaceMismatch {
                estimator: estimator.num_actions(),
                environment: num_actions,
            });
        }

        // one buffer per run; nothing carries over from an earlier call
        self.buffer = Self::fresh_buffer(&self.config);
        let encoder = encoder_for(&env.observation_space());

        info!(
            episodes = self.config.num_episodes,
            capacity = self.config.buffer_capacity,
            batch_size = self.config.batch_size,
            "starting training"
        );

        let mut episode_rewards: Vec<f64> = vec![0.0];
        let mut global_step = 0usize;
        let mut updates = 0usize;
        let mut syncs = 0usize;
        let mut last_loss = None;
        let mut observation = env.reset()?;
        encoder.check(&observation)?;

        for _ in 0..self.config.num_episodes {
            let mut done = false;
            while !done {
                let explore_prob = self.exploration.value(global_step);
                let action = estimator.act(&observation, explore_prob)?;
                if action >= num_actions {
                    return Err(SamplerError::InvalidAction { action, num_actions });
                }

                let step = env.step(action)?;
                encoder.check(&step.observation)?;
                done = step.done;
                self.buffer.add(
                    observation,
                    action,
                    step.reward,
                    step.observation.clone(),
                    done,
                );
                if let Some(total) = episode_rewards.last_mut() {
                    *total += step.reward as f64;
                }
                observation = step.observation;

                if done {
                    if episode_rewards.len() % self.config.report_every == 0 {
                        let report = EpisodeReport {
                            steps: global_step,
                            episodes: episode_rewards.len(),
                            mean_reward: trailing_mean(&episode_rewards, self.config.report_window),
                            quality: env.quality_metric(),
                            explore_prob,
                        };
                        self.reporter.report(&report)?;
                    }
                    observation = env.reset()?;
                    encoder.check(&observation)?;
                    episode_rewards.push(0.0);
                }

                if global_step > self.config.learning_starts
                    && self.buffer.len() >= self.config.batch_size
                {
                    let batch = self.buffer.sample(self.config.batch_size)?;
                    let loss = estimator.update(&batch)?;
                    debug!(step = global_step, loss, "updated online network");
                    last_loss = Some(loss);
                    updates += 1;
                }

                if global_step % self.config.target_update_interval == 0 {
                    estimator.sync_target()?;
                    debug!(step = global_step, "synced target network");
                    syncs += 1;
                }

                global_step += 1;
            }
        }

        self.reporter.finish()?;
        info!(
            steps = global_step,
            episodes = self.config.num_episodes,
            updates,
            syncs,
            "training finished"
        );

        Ok(TrainingSummary {
            episode_rewards,
            global_steps: global_step,
            completed_episodes: self.config.num_episodes,
            updates,
            syncs,
            last_loss,
        })
    }
}

/// Mean of the last `window` entries, i.e. the most recent completed episodes
/// when called right after an episode ends.
fn trailing_mean(rewards: &[f64], window: usize) -> f64 {
    let start = rewards.len().saturating_sub(window);
    let tail = &rewards[start..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}
