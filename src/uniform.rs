//! Uniform allocation baseline.
//!
//! The budget is split evenly over all `K(K-1)/2` pairs:
//! `n = floor(2·budget / (K·(K-1)))` joint draws each, sampled pair by pair in lexicographic
//! order. One MSE estimate is made once everything is sampled, and the arg-min (lowest index
//! on ties) is returned.

use log::debug;

use crate::{
    accumulate_pair, argmin_lowest_index, estimate_mse, num_pairs, ArmPair, CorrelatedSource,
    Error, Identification, IdentificationPolicy, PairStatsAccumulator,
};

/// The uniform-allocation policy (see [`uniform_allocation`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformAllocator;

impl UniformAllocator {
    /// Shorthand for [`uniform_allocation`].
    pub fn run<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error> {
        uniform_allocation(source, budget)
    }
}

/// Joint draws per pair for `budget`: `floor(budget / (K(K-1)/2))`.
///
/// Fails with [`Error::InvalidBudget`] when that would be zero.
pub fn uniform_samples_per_pair(num_arms: usize, budget: u64) -> Result<u64, Error> {
    let pairs = num_pairs(num_arms);
    if pairs == 0 {
        return Err(Error::InvalidModel(format!(
            "need at least 2 arms, got {num_arms}"
        )));
    }
    if budget < pairs {
        return Err(Error::InvalidBudget {
            budget,
            min: pairs,
        });
    }
    Ok(budget / pairs)
}

/// Run uniform allocation against `source` with a total `budget`.
pub fn uniform_allocation<S: CorrelatedSource + ?Sized>(
    source: &mut S,
    budget: u64,
) -> Result<Identification, Error> {
    let k = source.num_arms();
    let per_pair = uniform_samples_per_pair(k, budget)?;

    let pairs = ArmPair::all(k);
    let mut stats = PairStatsAccumulator::with_pairs(pairs.iter().copied());
    for &pair in &pairs {
        accumulate_pair(source, &mut stats, pair, per_pair)?;
    }

    let mse = estimate_mse(&stats, k)?;
    let best_arm = argmin_lowest_index(&mse).ok_or(Error::IncompleteStatistics { arm: 0 })?;
    debug!(
        "uniform: k={k} budget={budget} per_pair={per_pair} best_arm={best_arm} mse={mse:?}"
    );

    Ok(Identification {
        policy: IdentificationPolicy::Uniform,
        best_arm,
        mse,
        samples_drawn: stats.total_samples(),
        phases: Vec::new(),
    })
}
