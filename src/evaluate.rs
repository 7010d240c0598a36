use tracing::info;

use crate::{
    env::Environment,
    error::{Result, SamplerError},
    estimator::ValueEstimator,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSummary {
    pub steps: usize,
    pub quality: f64,
}

/// Plays one episode with a fixed exploration probability and no learning.
///
/// `explore_prob` must lie in `(0, 1]`; a fully greedy policy can cycle
/// forever on a deterministic environment. Nothing is stored and the
/// estimator is only queried through `act`. `render` asks the environment to
/// draw itself after every step.
pub fn evaluate<E, V>(
    env: &mut E,
    estimator: &mut V,
    explore_prob: f64,
    render: bool,
) -> Result<EvaluationSummary>
where
    E: Environment + ?Sized,
    V: ValueEstimator + ?Sized,
{
    if !(explore_prob > 0.0 && explore_prob <= 1.0) {
        return Err(SamplerError::InvalidConfig(format!(
            "evaluation explore_prob {explore_prob} outside (0, 1]"
        )));
    }

    let num_actions = env.num_actions();
    if estimator.num_actions() != num_actions {
        return Err(SamplerError::ActionSpaceMismatch {
            estimator: estimator.num_actions(),
            environment: num_actions,
        });
    }

    let mut observation = env.reset()?;
    let mut steps = 0usize;
    loop {
        let action = estimator.act(&observation, explore_prob)?;
        if action >= num_actions {
            return Err(SamplerError::InvalidAction { action, num_actions });
        }
        let step = env.step(action)?;
        steps += 1;
        if render {
            env.render()?;
        }
        if step.done {
            break;
        }
        observation = step.observation;
    }

    let quality = env.quality_metric();
    info!(steps, nmse = quality, "evaluation finished");
    Ok(EvaluationSummary { steps, quality })
}
