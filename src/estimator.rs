use crate::buffer::Batch;
use crate::error::Result;

/// Action-value estimator driven by the training and evaluation loops.
///
/// Implementations own an online and a target parameter set. The online set
/// moves on every `update`; the target set only changes through
/// `sync_target` (and the initial copy made by `initialize`).
pub trait ValueEstimator {
    fn num_actions(&self) -> usize;

    /// One-time setup; must run exactly once before `act` or `update`.
    fn initialize(&mut self) -> Result<()>;

    /// Online action values for a single observation.
    fn estimate(&self, observation: &[f32]) -> Result<Vec<f32>>;

    /// Epsilon-greedy action selection.
    fn act(&mut self, observation: &[f32], explore_prob: f64) -> Result<usize>;

    /// One optimisation step on the temporal-difference error; returns the loss.
    fn update(&mut self, batch: &Batch) -> Result<f32>;

    fn sync_target(&mut self) -> Result<()>;
}

/// Index of the first maximal value.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}
