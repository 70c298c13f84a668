//! Crate error type.
//!
//! Every failure here is a violated precondition on a deterministic numeric computation, so
//! errors surface at the first offending call and nothing is retried.

use thiserror::Error;

/// Errors returned by models, accumulators, estimators and policies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed covariance matrix, or a sample request the model cannot serve.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Arm index outside `[0, num_arms)`.
    #[error("arm {arm} is out of range for a model with {num_arms} arms")]
    UnknownArm { arm: usize, num_arms: usize },

    /// A pair must join two distinct arms.
    #[error("pair endpoints must differ (got ({arm}, {arm}))")]
    InvalidPair { arm: usize },

    /// Budget too small to give every pair at least one joint sample.
    #[error("budget {budget} is below the minimum of {min} (one sample per pair)")]
    InvalidBudget { budget: u64, min: u64 },

    /// The estimator was asked for an arm that no accumulated pair involves.
    #[error("no pair statistics involve arm {arm}")]
    IncompleteStatistics { arm: usize },

    /// Experiment configuration is unusable (e.g. zero trials).
    #[error("invalid experiment configuration: {0}")]
    InvalidConfig(String),
}
