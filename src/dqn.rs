//! Deep Q-network value estimator

use candle_core::{backprop::GradStore, Tensor, D};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarMap};
use candle_optimisers::adam::{Adam, ParamsAdam};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::{
    buffer::Batch,
    config::{EstimatorConfig, OptimiserKind, TdLoss},
    device::DEVICE,
    encoder::{encoder_for, ObservationEncoder},
    env::ObservationSpace,
    error::{Result, SamplerError},
    estimator::{argmax, ValueEstimator},
    mlp::MultiLayerPerceptron,
};

/// Rescales every gradient in `grad_store` so the global L2 norm is at most
/// `max_norm`. Returns the norm before clipping.
fn clip_gradients(grad_store: &mut GradStore, var_map: &VarMap, max_norm: f32) -> Result<f32> {
    let mut total_norm_sq: f32 = 0.0;
    let mut grads = vec![];

    for var in var_map.all_vars() {
        let tensor = var.as_tensor();
        if let Some(grad) = grad_store.get(tensor) {
            total_norm_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
            grads.push((var, grad.clone()));
        }
    }

    let total_norm = total_norm_sq.sqrt();
    if total_norm > max_norm {
        let scale = (max_norm / total_norm) as f64;
        for (var, grad) in grads {
            grad_store.insert(var.as_tensor(), grad.affine(scale, 0.0)?);
        }
    }

    Ok(total_norm)
}

enum Optimiser {
    Adam(Adam),
    AdamW(AdamW),
}

impl Optimiser {
    fn new(kind: OptimiserKind, var_map: &VarMap, lr: f64) -> Result<Self> {
        let vars = var_map.all_vars();
        Ok(match kind {
            OptimiserKind::Adam => Optimiser::Adam(Adam::new(
                vars,
                ParamsAdam {
                    lr,
                    ..Default::default()
                },
            )?),
            OptimiserKind::AdamW => Optimiser::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    ..Default::default()
                },
            )?),
        })
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Optimiser::Adam(opt) => opt.step(grads)?,
            Optimiser::AdamW(opt) => opt.step(grads)?,
        }
        Ok(())
    }
}

/// DQN over a flat observation vector.
///
/// `online` is trained by every `update`; `target` only changes through
/// `sync_target`, which deep-copies the online parameters by name.
pub struct DqnEstimator {
    online: MultiLayerPerceptron,
    target: MultiLayerPerceptron,
    optimiser: Optimiser,
    encoder: Box<dyn ObservationEncoder>,
    num_actions: usize,
    gamma: f64,
    loss: TdLoss,
    grad_norm_clip: Option<f32>,
    rng: StdRng,
    initialized: bool,
}

impl DqnEstimator {
    pub fn new(
        space: &ObservationSpace,
        num_actions: usize,
        config: &EstimatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if num_actions == 0 {
            return Err(SamplerError::InvalidConfig(
                "action space must not be empty".into(),
            ));
        }

        let encoder = encoder_for(space);
        let mut topology = Vec::with_capacity(config.hidden_layers.len() + 2);
        topology.push(encoder.dim());
        topology.extend_from_slice(&config.hidden_layers);
        topology.push(num_actions);

        let online = MultiLayerPerceptron::new(&topology)?;
        let target = MultiLayerPerceptron::new(&topology)?;
        let optimiser = Optimiser::new(config.optimiser, &online.var_map, config.learning_rate)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            online,
            target,
            optimiser,
            encoder,
            num_actions,
            gamma: config.gamma,
            loss: config.loss,
            grad_norm_clip: config.grad_norm_clip,
            rng,
            initialized: false,
        })
    }

    /// Target-network action values for a single observation.
    pub fn target_estimate(&self, observation: &[f32]) -> Result<Vec<f32>> {
        Self::q_values(&self.target, self.encoder.as_ref(), observation)
    }

    fn q_values(
        net: &MultiLayerPerceptron,
        encoder: &dyn ObservationEncoder,
        observation: &[f32],
    ) -> Result<Vec<f32>> {
        let mut input = Vec::with_capacity(encoder.dim());
        encoder.encode(observation, &mut input)?;
        let x = Tensor::from_vec(input, (1, encoder.dim()), &DEVICE)?;
        Ok(net.output(x)?.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn encode_rows(&self, rows: &[Vec<f32>]) -> Result<Tensor> {
        let dim = self.encoder.dim();
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            self.encoder.encode(row, &mut flat)?;
        }
        Ok(Tensor::from_vec(flat, (rows.len(), dim), &DEVICE)?)
    }

    fn td_loss(&self, predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        Ok(match self.loss {
            TdLoss::Mse => loss::mse(predicted, expected)?,
            TdLoss::Huber => {
                let abs = predicted.sub(expected)?.abs()?;
                let quadratic = abs.clamp(0f32, 1f32)?;
                let linear = abs.sub(&quadratic)?;
                quadratic
                    .sqr()?
                    .affine(0.5, 0.0)?
                    .add(&linear)?
                    .mean_all()?
            }
        })
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SamplerError::NotInitialized)
        }
    }
}

impl ValueEstimator for DqnEstimator {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(SamplerError::AlreadyInitialized);
        }
        self.target.copy_from(&self.online)?;
        self.initialized = true;
        Ok(())
    }

    fn estimate(&self, observation: &[f32]) -> Result<Vec<f32>> {
        Self::q_values(&self.online, self.encoder.as_ref(), observation)
    }

    fn act(&mut self, observation: &[f32], explore_prob: f64) -> Result<usize> {
        self.ensure_initialized()?;
        // shape errors surface even when the action ends up random
        self.encoder.check(observation)?;

        if self.rng.random::<f64>() < explore_prob {
            return Ok(self.rng.random_range(0..self.num_actions));
        }

        let values = self.estimate(observation)?;
        let action = argmax(&values).ok_or_else(|| {
            SamplerError::Estimator("estimator produced no action values".into())
        })?;
        if action >= self.num_actions {
            return Err(SamplerError::InvalidAction {
                action,
                num_actions: self.num_actions,
            });
        }
        Ok(action)
    }

    fn update(&mut self, batch: &Batch) -> Result<f32> {
        self.ensure_initialized()?;
        let n = batch.len();
        if n == 0 {
            return Err(SamplerError::Estimator("cannot update on an empty batch".into()));
        }
        if let Some(&action) = batch.actions.iter().find(|&&a| a >= self.num_actions) {
            return Err(SamplerError::InvalidAction {
                action,
                num_actions: self.num_actions,
            });
        }

        let states = self.encode_rows(&batch.observations)?;
        let next_states = self.encode_rows(&batch.next_observations)?;
        let actions: Vec<u32> = batch.actions.iter().map(|&a| a as u32).collect();
        let not_done: Vec<f32> = batch
            .dones
            .iter()
            .map(|&d| if d { 0.0 } else { 1.0 })
            .collect();

        let action_tensor = Tensor::from_vec(actions, (n, 1), &DEVICE)?;
        let reward_tensor = Tensor::from_slice(&batch.rewards, n, &DEVICE)?;
        let not_done_tensor = Tensor::from_vec(not_done, n, &DEVICE)?;

        let next_q_values = self.target.output(next_states)?.detach();
        let max_next_q = next_q_values.max(D::Minus1)?;
        let expected_q_values = reward_tensor.add(
            &max_next_q
                .affine(self.gamma, 0.0)?
                .mul(&not_done_tensor)?,
        )?;

        let predicted_q_values = self.online.output(states)?;
        let relevant_q_values = predicted_q_values
            .gather(&action_tensor, D::Minus1)?
            .squeeze(1)?;
        let loss = self.td_loss(&relevant_q_values, &expected_q_values)?;

        let mut grads = loss.backward()?;
        if let Some(max_norm) = self.grad_norm_clip {
            let norm = clip_gradients(&mut grads, &self.online.var_map, max_norm)?;
            debug!(grad_norm = norm, "clipped gradients");
        }
        self.optimiser.step(&grads)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    fn sync_target(&mut self) -> Result<()> {
        self.target.copy_from(&self.online)
    }
}
