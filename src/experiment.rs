//! Repeated-trial experiments: success rates of identification policies.
//!
//! An experiment runs a policy `trials` times against fresh [`GaussianSource`]s built from one
//! [`CovarianceModel`], and scores each run against the model's true best arm(s).
//!
//! Notes:
//! - Trial seeds are drawn up front from one `StdRng` seeded with `seed` (see
//!   [`trial_seeds`]), so results do not depend on how trials are spread across threads.
//! - Both policies see the same trial seeds, so a comparison runs them on common random
//!   numbers.
//! - With the `parallel` feature, trials run on the rayon thread pool.
//! - Ties in the true MSE (within `tie_tol`) count every tied arm as correct.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    Arm, BestArmPolicy, CovarianceModel, Error, GaussianSource,
    Identification, IdentificationPolicy, SuccessiveRejects, UniformAllocator,
};

/// Parameters shared by every trial of an experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExperimentConfig {
    /// Total joint draws per run.
    pub budget: u64,
    /// Independent runs per policy.
    pub trials: usize,
    /// Base seed for the experiment.
    pub seed: u64,
    /// Absolute tolerance when deciding which arms are truly best.
    pub tie_tol: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            budget: 50_000,
            trials: 100,
            seed: 0,
            tie_tol: 1e-9,
        }
    }
}

impl ExperimentConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.trials == 0 {
            return Err(Error::InvalidConfig(
                "an experiment needs at least one trial".to_string(),
            ));
        }
        if !self.tie_tol.is_finite() || self.tie_tol < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tie tolerance must be finite and non-negative, got {}",
                self.tie_tol
            )));
        }
        Ok(())
    }
}

/// How often one policy found a true best arm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuccessRate {
    pub policy: IdentificationPolicy,
    pub budget: u64,
    pub trials: u64,
    pub successes: u64,
    /// How many times each arm was returned, indexed by arm.
    pub picks: Vec<u64>,
}

impl SuccessRate {
    /// Fraction of trials that returned a true best arm.
    pub fn rate(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.successes as f64 / self.trials as f64
    }
}

/// Both policies scored on the same model and budget.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyComparison {
    pub budget: u64,
    /// True best arm(s) of the model.
    pub best_arms: Vec<Arm>,
    pub uniform: SuccessRate,
    pub successive_rejects: SuccessRate,
}

impl PolicyComparison {
    /// Successive Rejects' success rate minus uniform allocation's.
    pub fn rate_difference(&self) -> f64 {
        self.successive_rejects.rate() - self.uniform.rate()
    }
}

/// Source seeds for `trials` runs under the experiment seed `seed`.
///
/// A longer run extends a shorter one: the first `n` seeds do not depend on `trials`.
pub fn trial_seeds(seed: u64, trials: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..trials).map(|_| rng.random()).collect()
}

/// Run `policy` for every trial of `config` and return the raw identifications, in trial order.
pub fn run_trials<P: BestArmPolicy + Sync>(
    model: &CovarianceModel,
    policy: &P,
    config: &ExperimentConfig,
) -> Result<Vec<Identification>, Error> {
    config.validate()?;
    let seeds = trial_seeds(config.seed, config.trials);
    let run_one = |&seed: &u64| -> Result<Identification, Error> {
        let mut source = GaussianSource::with_seed(model.clone(), seed);
        policy.identify(&mut source, config.budget)
    };

    #[cfg(feature = "parallel")]
    let runs = seeds.par_iter().map(run_one).collect();
    #[cfg(not(feature = "parallel"))]
    let runs = seeds.iter().map(run_one).collect();
    runs
}

/// Success rate of `policy` on `model` under `config`.
pub fn success_rate<P: BestArmPolicy + Sync>(
    model: &CovarianceModel,
    policy: &P,
    config: &ExperimentConfig,
) -> Result<SuccessRate, Error> {
    let best = model.best_arms(config.tie_tol);
    let runs = run_trials(model, policy, config)?;

    let mut picks = vec![0u64; model.num_arms()];
    let mut successes = 0u64;
    for id in &runs {
        picks[id.best_arm] += 1;
        if id.is_correct(&best) {
            successes += 1;
        }
    }
    let out = SuccessRate {
        policy: policy.kind(),
        budget: config.budget,
        trials: runs.len() as u64,
        successes,
        picks,
    };
    debug!(
        "{}: budget={} successes={}/{} picks={:?}",
        out.policy, out.budget, out.successes, out.trials, out.picks
    );
    Ok(out)
}

/// Score uniform allocation and Successive Rejects on the same model and budget.
pub fn compare_policies(
    model: &CovarianceModel,
    config: &ExperimentConfig,
) -> Result<PolicyComparison, Error> {
    let uniform = success_rate(model, &UniformAllocator, config)?;
    let successive_rejects = success_rate(model, &SuccessiveRejects, config)?;
    info!(
        "budget={} trials={}: uniform={:.3} successive-rejects={:.3}",
        config.budget,
        config.trials,
        uniform.rate(),
        successive_rejects.rate()
    );
    Ok(PolicyComparison {
        budget: config.budget,
        best_arms: model.best_arms(config.tie_tol),
        uniform,
        successive_rejects,
    })
}

/// [`compare_policies`] at each of `budgets`, in the given order.
pub fn budget_sweep(
    model: &CovarianceModel,
    budgets: &[u64],
    config: &ExperimentConfig,
) -> Result<Vec<PolicyComparison>, Error> {
    if budgets.is_empty() {
        return Err(Error::InvalidConfig(
            "a budget sweep needs at least one budget".to_string(),
        ));
    }
    budgets
        .iter()
        .map(|&budget| compare_policies(model, &ExperimentConfig { budget, ..*config }))
        .collect()
}
