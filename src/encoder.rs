//! Observation encoders, resolved once per observation space

use crate::env::ObservationSpace;
use crate::error::{Result, SamplerError};

/// Validates an observation against its space and flattens it into network
/// input.
pub trait ObservationEncoder: Send + Sync {
    /// Number of input features produced per observation.
    fn dim(&self) -> usize;

    /// Appends the encoded observation to `out`.
    fn encode(&self, observation: &[f32], out: &mut Vec<f32>) -> Result<()>;

    fn check(&self, observation: &[f32]) -> Result<()> {
        if observation.len() != self.dim() {
            return Err(SamplerError::ShapeMismatch {
                expected: format!("[{}]", self.dim()),
                actual: format!("[{}]", observation.len()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FlatBinary {
    n: usize,
}

impl ObservationEncoder for FlatBinary {
    fn dim(&self) -> usize {
        self.n
    }

    fn encode(&self, observation: &[f32], out: &mut Vec<f32>) -> Result<()> {
        self.check(observation)?;
        if let Some(pos) = observation.iter().position(|&v| v != 0.0 && v != 1.0) {
            return Err(SamplerError::ShapeMismatch {
                expected: format!("binary [{}]", self.n),
                actual: format!("value {} at index {pos}", observation[pos]),
            });
        }
        out.extend_from_slice(observation);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FlatReal {
    shape: Vec<usize>,
    dim: usize,
}

impl ObservationEncoder for FlatReal {
    fn dim(&self) -> usize {
        self.dim
    }

    fn check(&self, observation: &[f32]) -> Result<()> {
        if observation.len() != self.dim {
            return Err(SamplerError::ShapeMismatch {
                expected: format!("{:?} ({} values)", self.shape, self.dim),
                actual: format!("[{}]", observation.len()),
            });
        }
        Ok(())
    }

    fn encode(&self, observation: &[f32], out: &mut Vec<f32>) -> Result<()> {
        self.check(observation)?;
        if let Some(pos) = observation.iter().position(|v| !v.is_finite()) {
            return Err(SamplerError::ShapeMismatch {
                expected: format!("finite {:?}", self.shape),
                actual: format!("{} at index {pos}", observation[pos]),
            });
        }
        out.extend_from_slice(observation);
        Ok(())
    }
}

pub fn encoder_for(space: &ObservationSpace) -> Box<dyn ObservationEncoder> {
    match space {
        ObservationSpace::MultiBinary { n } => Box::new(FlatBinary { n: *n }),
        ObservationSpace::Box { shape } => Box::new(FlatReal {
            shape: shape.clone(),
            dim: space.flat_dim(),
        }),
    }
}
