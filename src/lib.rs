//! Actively sampling the nodes of a graph signal with a deep Q-network.
//!
//! The [`trainer::Trainer`] drives any [`env::Environment`] and
//! [`estimator::ValueEstimator`] through an annealed exploration schedule,
//! a replay buffer and periodic target-network syncs. [`evaluate::evaluate`]
//! plays a single near-greedy episode and reports the environment's
//! reconstruction error.

pub mod buffer;
pub mod config;
pub mod demo;
pub mod device;
pub mod dqn;
pub mod encoder;
pub mod env;
pub mod error;
pub mod estimator;
pub mod evaluate;
pub mod mlp;
pub mod report;
pub mod schedule;
pub mod trainer;

pub use error::{Result, SamplerError};
