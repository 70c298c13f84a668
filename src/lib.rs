//! `pairbai`: fixed-budget best-arm identification with correlated pairwise MSE.
//!
//! Setting: K arms are jointly Gaussian with zero mean and a known-to-the-simulator (but not
//! to the policy) covariance Σ. The quality of arm `i` is its **mean squared error** against
//! every other arm:
//!
//! ```text
//!   MSE_i = Σ_{j≠i} σ_j² (1 − ρ_ij²)
//! ```
//!
//! i.e. how much of each other arm's variance arm `i` fails to explain linearly. The best
//! arm has the smallest MSE. Policies can only observe arms **in pairs** (one joint draw of
//! `(X_i, X_j)` costs one unit of budget) and must name the best arm after spending a fixed
//! budget.
//!
//! **Policies:**
//! - [`UniformAllocator`] / [`uniform_allocation`]: split the budget evenly over all
//!   `K(K-1)/2` pairs, estimate once, return the arg-min.
//! - [`SuccessiveRejects`] / [`successive_rejects`]: `K-1` phases; after each phase the arm
//!   with the largest estimated MSE is eliminated and pairs between eliminated arms stop being
//!   sampled. Phase lengths follow the classic `log_bar(K)` schedule adapted to pairs.
//! - [`BestArmPolicy`]: common `identify(source, budget)` trait over both.
//!
//! **Building blocks:**
//! - [`CovarianceModel`]: validated symmetric PSD Σ with [`CovarianceModel::true_mse`].
//! - [`CorrelatedSource`] / [`GaussianSource`]: seedable joint sampler.
//! - [`PairStats`] / [`PairStatsAccumulator`]: mergeable per-pair sufficient statistics.
//! - [`estimate_arm_mse`] / [`estimate_mse`]: the plug-in MSE estimator.
//! - [`experiment`]: repeated-trial success rates, policy comparison, budget sweeps.
//!
//! **Goals:**
//! - **Deterministic by default**: same model + seed + budget → same identification.
//! - **Audit-friendly**: Successive Rejects returns its full per-phase elimination trace.
//! - **Small K**: designed for a handful of arms; statistics are kept per pair.
//!
//! **Non-goals:**
//! - Not an adaptive (fixed-confidence) procedure: the budget is fixed up front.
//! - No non-Gaussian sources and no unknown-mean corrections beyond the sample mean.
//!
//! # Example
//!
//! ```rust
//! use pairbai::{BestArmPolicy, CovarianceModel, GaussianSource, SuccessiveRejects};
//!
//! let model = CovarianceModel::new(vec![
//!     vec![1.0, 0.6, 0.2, 0.1],
//!     vec![0.6, 1.0, 0.1, 0.1],
//!     vec![0.2, 0.1, 1.0, 0.0],
//!     vec![0.1, 0.1, 0.0, 1.0],
//! ])
//! .unwrap();
//!
//! let mut source = GaussianSource::with_seed(model.clone(), 0);
//! let id = SuccessiveRejects.identify(&mut source, 20_000).unwrap();
//! assert!(id.best_arm < 4);
//! assert_eq!(id.phases.len(), 3);
//! assert_eq!(id.elimination_order().len(), 4);
//! ```

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod pair;
pub use pair::*;

mod covariance;
pub use covariance::*;

mod source;
pub use source::*;

mod pair_stats;
pub use pair_stats::*;

mod estimator;
pub use estimator::*;

mod identification;
pub use identification::*;

mod uniform;
pub use uniform::*;

mod successive_rejects;
pub use successive_rejects::*;

mod policy;
pub use policy::*;

pub mod experiment;
pub use experiment::{
    budget_sweep, compare_policies, success_rate, ExperimentConfig, PolicyComparison,
    SuccessRate,
};

pub const PAIRBAI_VERSION: &str = env!("CARGO_PKG_VERSION");
