use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use sampling_agent::{
    buffer::Batch,
    config::{EstimatorConfig, TrainerConfig},
    demo::{PathSignalConfig, PathSignalEnv},
    dqn::DqnEstimator,
    env::{Environment, ObservationSpace, Step},
    estimator::ValueEstimator,
    evaluate::evaluate,
    report::{EpisodeReport, NoopReporter},
    trainer::Trainer,
    Result, SamplerError,
};

/// Deterministic environment whose episodes last `episode_len` steps and pay
/// a reward of 1 per step.
struct FixedLengthEnv {
    episode_len: usize,
    t: usize,
    resets: usize,
    steps: usize,
}

impl FixedLengthEnv {
    fn new(episode_len: usize) -> Self {
        Self {
            episode_len,
            t: 0,
            resets: 0,
            steps: 0,
        }
    }
}

impl Environment for FixedLengthEnv {
    fn observation_space(&self) -> ObservationSpace {
        ObservationSpace::Box { shape: vec![2] }
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.t = 0;
        self.resets += 1;
        Ok(vec![0.0, 0.0])
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        self.t += 1;
        self.steps += 1;
        Ok(Step::new(
            vec![self.t as f32, action as f32],
            1.0,
            self.t >= self.episode_len,
        ))
    }

    fn quality_metric(&self) -> f64 {
        0.25
    }
}

#[derive(Default)]
struct Calls {
    initialize: usize,
    act: usize,
    update: usize,
    sync: usize,
    batch_sizes: Vec<usize>,
    explore_probs: Vec<f64>,
}

/// Records every call; always picks action 0.
struct CountingEstimator {
    num_actions: usize,
    next_action: usize,
    calls: Rc<RefCell<Calls>>,
}

impl CountingEstimator {
    fn new(num_actions: usize) -> (Self, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        (
            Self {
                num_actions,
                next_action: 0,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl ValueEstimator for CountingEstimator {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn initialize(&mut self) -> Result<()> {
        self.calls.borrow_mut().initialize += 1;
        Ok(())
    }

    fn estimate(&self, _observation: &[f32]) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.num_actions])
    }

    fn act(&mut self, _observation: &[f32], explore_prob: f64) -> Result<usize> {
        let mut calls = self.calls.borrow_mut();
        calls.act += 1;
        calls.explore_probs.push(explore_prob);
        Ok(self.next_action)
    }

    fn update(&mut self, batch: &Batch) -> Result<f32> {
        let mut calls = self.calls.borrow_mut();
        calls.update += 1;
        calls.batch_sizes.push(batch.len());
        Ok(0.0)
    }

    fn sync_target(&mut self) -> Result<()> {
        self.calls.borrow_mut().sync += 1;
        Ok(())
    }
}

fn config(episodes: usize) -> TrainerConfig {
    TrainerConfig {
        buffer_capacity: 100,
        batch_size: 1,
        learning_starts: 0,
        target_update_interval: 2,
        num_episodes: episodes,
        report_every: 1,
        seed: Some(5),
        ..Default::default()
    }
}

#[test]
fn one_step_episodes_sync_every_other_step() {
    let mut env = FixedLengthEnv::new(1);
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut trainer = Trainer::new(config(10), NoopReporter).unwrap();

    let summary = trainer.train(&mut env, &mut estimator).unwrap();

    assert_eq!(calls.borrow().sync, 5);
    assert_eq!(summary.syncs, 5);
    assert_eq!(summary.episode_rewards.len(), 11);
    assert_eq!(summary.episode_rewards[..10], [1.0; 10]);
    assert_eq!(summary.episode_rewards[10], 0.0);
    assert_eq!(summary.global_steps, 10);
    assert_eq!(summary.completed_episodes, 10);
    // one reset to start plus one per completed episode
    assert_eq!(env.resets, 11);
}

#[test]
fn learning_waits_for_the_warm_up_threshold() {
    let mut env = FixedLengthEnv::new(3);
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut cfg = config(4);
    cfg.learning_starts = 5;
    cfg.batch_size = 2;
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    let summary = trainer.train(&mut env, &mut estimator).unwrap();

    // steps 0..=11; learning on steps 6..=11
    assert_eq!(summary.global_steps, 12);
    assert_eq!(calls.borrow().update, 6);
    assert_eq!(summary.updates, 6);
    assert!(calls.borrow().batch_sizes.iter().all(|&n| n == 2));
}

#[test]
fn learning_never_samples_an_underfilled_buffer() {
    let mut env = FixedLengthEnv::new(1);
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut cfg = config(6);
    cfg.batch_size = 4;
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    trainer.train(&mut env, &mut estimator).unwrap();

    // buffer reaches 4 transitions after step 3; steps 3, 4, 5 learn
    assert_eq!(calls.borrow().update, 3);
}

#[test]
fn buffer_keeps_only_the_latest_transitions() {
    let mut env = FixedLengthEnv::new(5);
    let (mut estimator, _calls) = CountingEstimator::new(2);
    let mut cfg = config(2);
    cfg.buffer_capacity = 3;
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    trainer.train(&mut env, &mut estimator).unwrap();

    let buffer = trainer.buffer();
    assert_eq!(buffer.len(), 3);
    let ts: Vec<f32> = buffer.iter().map(|t| t.next_observation[0]).collect();
    assert_eq!(ts, vec![3.0, 4.0, 5.0]);
    assert!(buffer.iter().last().unwrap().done);
}

#[test]
fn exploration_follows_the_global_step() {
    let mut env = FixedLengthEnv::new(4);
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut cfg = config(3);
    cfg.exploration_steps = 10;
    cfg.exploration_initial = 1.0;
    cfg.exploration_final = 0.0;
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    trainer.train(&mut env, &mut estimator).unwrap();

    let probs = &calls.borrow().explore_probs;
    assert_eq!(probs.len(), 12);
    for (t, &p) in probs.iter().enumerate() {
        let expected = (1.0 - t as f64 / 10.0).max(0.0);
        assert_relative_eq!(p, expected, epsilon = 1e-12);
    }
}

#[test]
fn reports_follow_the_cadence() {
    let mut env = FixedLengthEnv::new(2);
    let (mut estimator, _calls) = CountingEstimator::new(2);
    let mut cfg = config(9);
    cfg.report_every = 3;
    cfg.report_window = 2;

    let mut seen: Vec<EpisodeReport> = Vec::new();
    {
        let mut trainer = Trainer::new(cfg, |r: &EpisodeReport| seen.push(r.clone())).unwrap();
        trainer.train(&mut env, &mut estimator).unwrap();
    }

    let episodes: Vec<usize> = seen.iter().map(|r| r.episodes).collect();
    assert_eq!(episodes, vec![3, 6, 9]);
    let first = &seen[0];
    assert_eq!(first.steps, 5);
    assert_relative_eq!(first.mean_reward, 2.0);
    assert_relative_eq!(first.quality, 0.25);
}

#[test]
fn mismatched_action_spaces_abort_before_stepping() {
    let mut env = FixedLengthEnv::new(1);
    let (mut estimator, calls) = CountingEstimator::new(3);
    let mut trainer = Trainer::new(config(1), NoopReporter).unwrap();

    let err = trainer.train(&mut env, &mut estimator).unwrap_err();
    assert!(matches!(
        err,
        SamplerError::ActionSpaceMismatch { estimator: 3, environment: 2 }
    ));
    assert_eq!(calls.borrow().act, 0);
    assert_eq!(env.steps, 0);
}

#[test]
fn out_of_range_actions_are_fatal() {
    let mut env = FixedLengthEnv::new(1);
    let (mut estimator, _calls) = CountingEstimator::new(2);
    estimator.next_action = 7;
    let mut trainer = Trainer::new(config(1), NoopReporter).unwrap();

    let err = trainer.train(&mut env, &mut estimator).unwrap_err();
    assert!(matches!(
        err,
        SamplerError::InvalidAction { action: 7, num_actions: 2 }
    ));
}

#[test]
fn evaluation_runs_one_episode_without_learning() {
    let mut env = FixedLengthEnv::new(4);
    let (mut estimator, calls) = CountingEstimator::new(2);

    let summary = evaluate(&mut env, &mut estimator, 0.05, false).unwrap();

    assert_eq!(summary.steps, 4);
    assert_relative_eq!(summary.quality, 0.25);
    let calls = calls.borrow();
    assert_eq!(calls.update, 0);
    assert_eq!(calls.sync, 0);
    assert!(calls.explore_probs.iter().all(|&p| p == 0.05));
    assert_eq!(env.resets, 1);
}

#[test]
fn dqn_trains_and_evaluates_on_the_path_signal() {
    let mut env = PathSignalEnv::new(PathSignalConfig {
        cluster_sizes: vec![3, 4, 5],
        budget: 3,
        resample_signal: true,
        seed: Some(11),
    })
    .unwrap();
    let cfg = TrainerConfig {
        buffer_capacity: 64,
        batch_size: 8,
        learning_starts: 10,
        target_update_interval: 5,
        exploration_steps: 30,
        num_episodes: 20,
        report_every: 5,
        seed: Some(2),
        estimator: EstimatorConfig {
            hidden_layers: vec![16],
            gamma: 0.9,
            seed: Some(4),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut estimator =
        DqnEstimator::new(&env.observation_space(), env.num_actions(), &cfg.estimator).unwrap();
    estimator.initialize().unwrap();

    let mut reports = 0;
    let summary = {
        let mut trainer = Trainer::new(cfg, |_: &EpisodeReport| reports += 1).unwrap();
        trainer.train(&mut env, &mut estimator).unwrap()
    };

    assert_eq!(reports, 4);
    assert_eq!(summary.global_steps, 60);
    assert_eq!(summary.episode_rewards.len(), 21);
    // steps 11..=59 learn
    assert_eq!(summary.updates, 49);
    assert_eq!(summary.syncs, 12);
    assert!(summary.last_loss.unwrap().is_finite());

    let eval = evaluate(&mut env, &mut estimator, 0.1, false).unwrap();
    assert_eq!(eval.steps, 3);
    assert!(eval.quality.is_finite() && eval.quality >= 0.0);
}

/// Well-formed until the final step of each episode, whose observation has
/// the wrong length.
struct BadTerminalEnv {
    inner: FixedLengthEnv,
}

impl Environment for BadTerminalEnv {
    fn observation_space(&self) -> ObservationSpace {
        self.inner.observation_space()
    }

    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.inner.reset()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        let mut step = self.inner.step(action)?;
        if step.done {
            step.observation = vec![0.0; 5];
        }
        Ok(step)
    }

    fn quality_metric(&self) -> f64 {
        self.inner.quality_metric()
    }
}

#[test]
fn malformed_terminal_observation_is_rejected_before_buffering() {
    let mut env = BadTerminalEnv {
        inner: FixedLengthEnv::new(2),
    };
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut trainer = Trainer::new(config(5), NoopReporter).unwrap();

    let err = trainer.train(&mut env, &mut estimator).unwrap_err();
    assert!(matches!(err, SamplerError::ShapeMismatch { .. }));
    // the first, well-formed step is stored; the terminal one never is
    assert_eq!(trainer.buffer().len(), 1);
    assert!(trainer.buffer().iter().all(|t| t.next_observation.len() == 2));
    assert_eq!(calls.borrow().act, 2);
}

#[test]
fn malformed_terminal_observation_fails_dqn_training_immediately() {
    let mut env = BadTerminalEnv {
        inner: FixedLengthEnv::new(1),
    };
    let cfg = config(5);
    let mut estimator =
        DqnEstimator::new(&env.observation_space(), env.num_actions(), &cfg.estimator).unwrap();
    estimator.initialize().unwrap();
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    let err = trainer.train(&mut env, &mut estimator).unwrap_err();
    assert!(matches!(err, SamplerError::ShapeMismatch { .. }));
    assert!(trainer.buffer().is_empty());
}

#[test]
fn each_training_run_starts_with_an_empty_buffer() {
    let mut env = FixedLengthEnv::new(1);
    let (mut estimator, calls) = CountingEstimator::new(2);
    let mut cfg = config(3);
    cfg.batch_size = 3;
    let mut trainer = Trainer::new(cfg, NoopReporter).unwrap();

    trainer.train(&mut env, &mut estimator).unwrap();
    assert_eq!(trainer.buffer().len(), 3);
    let first_updates = calls.borrow().update;

    let summary = trainer.train(&mut env, &mut estimator).unwrap();
    assert_eq!(trainer.buffer().len(), 3);
    // the second run refills from scratch, so it learns exactly as often
    assert_eq!(summary.updates, first_updates);
    assert_eq!(summary.updates, 1);
}

#[test]
fn evaluation_rejects_a_fully_greedy_policy() {
    let mut env = FixedLengthEnv::new(2);
    let (mut estimator, calls) = CountingEstimator::new(2);

    let err = evaluate(&mut env, &mut estimator, 0.0, false).unwrap_err();
    assert!(matches!(err, SamplerError::InvalidConfig(_)));
    assert_eq!(calls.borrow().act, 0);
    assert_eq!(env.resets, 0);
}
