//! Error types for the sampling agent

use thiserror::Error;

/// Errors raised by the replay buffer, estimators, environments and loops.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// A batch larger than the buffer contents was requested.
    #[error("insufficient data: requested {requested} transitions, buffer holds {available}")]
    InsufficientData { requested: usize, available: usize },

    /// An action index outside `[0, num_actions)`.
    #[error("invalid action {action}: action space has {num_actions} actions")]
    InvalidAction { action: usize, num_actions: usize },

    /// An observation whose length disagrees with the observation space.
    #[error("observation shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Estimator and environment disagree on the number of actions.
    #[error("action space mismatch: estimator has {estimator} actions, environment has {environment}")]
    ActionSpaceMismatch { estimator: usize, environment: usize },

    #[error("estimator used before initialize()")]
    NotInitialized,

    #[error("estimator already initialized")]
    AlreadyInitialized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("estimator error: {0}")]
    Estimator(String),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SamplerError>;
