//! Unified `BestArmPolicy` trait for fixed-budget identification policies.
//!
//! [`UniformAllocator`] and [`SuccessiveRejects`] share the same one-call interface:
//! `identify(source, budget) -> Identification`. This trait makes that explicit and lets
//! experiment code be generic over the policy.

use crate::{
    successive_rejects, uniform_allocation, CorrelatedSource, Error, Identification,
    IdentificationPolicy, SuccessiveRejects, UniformAllocator,
};

/// Common interface for fixed-budget best-arm identification policies.
///
/// # Example
///
/// ```rust
/// use pairbai::{
///     BestArmPolicy, CovarianceModel, GaussianSource, SuccessiveRejects, UniformAllocator,
/// };
///
/// fn run<P: BestArmPolicy>(policy: &P, model: &CovarianceModel) -> usize {
///     let mut source = GaussianSource::with_seed(model.clone(), 7);
///     policy.identify(&mut source, 3_000).unwrap().best_arm
/// }
///
/// let model = CovarianceModel::new(vec![
///     vec![1.0, 0.8, 0.0],
///     vec![0.8, 1.0, 0.0],
///     vec![0.0, 0.0, 1.0],
/// ])
/// .unwrap();
/// assert!(run(&UniformAllocator, &model) < 3);
/// assert!(run(&SuccessiveRejects, &model) < 3);
/// ```
pub trait BestArmPolicy {
    /// Which policy this is (for reporting).
    fn kind(&self) -> IdentificationPolicy;

    /// Spend `budget` joint draws from `source` and return the arm believed best.
    fn identify<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error>;
}

impl BestArmPolicy for UniformAllocator {
    fn kind(&self) -> IdentificationPolicy {
        IdentificationPolicy::Uniform
    }

    fn identify<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error> {
        uniform_allocation(source, budget)
    }
}

impl BestArmPolicy for SuccessiveRejects {
    fn kind(&self) -> IdentificationPolicy {
        IdentificationPolicy::SuccessiveRejects
    }

    fn identify<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error> {
        successive_rejects(source, budget)
    }
}

impl BestArmPolicy for IdentificationPolicy {
    fn kind(&self) -> IdentificationPolicy {
        *self
    }

    fn identify<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error> {
        match self {
            IdentificationPolicy::Uniform => uniform_allocation(source, budget),
            IdentificationPolicy::SuccessiveRejects => successive_rejects(source, budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CovarianceModel, GaussianSource};

    fn model() -> CovarianceModel {
        CovarianceModel::new(vec![
            vec![1.0, 0.9, 0.1],
            vec![0.9, 1.0, 0.1],
            vec![0.1, 0.1, 1.0],
        ])
        .unwrap()
    }

    fn run_generic<P: BestArmPolicy>(p: &P, seed: u64) -> Identification {
        let mut src = GaussianSource::with_seed(model(), seed);
        p.identify(&mut src, 2_000).unwrap()
    }

    #[test]
    fn struct_and_enum_dispatch_agree() {
        assert_eq!(
            run_generic(&UniformAllocator, 3),
            run_generic(&IdentificationPolicy::Uniform, 3)
        );
        assert_eq!(
            run_generic(&SuccessiveRejects, 3),
            run_generic(&IdentificationPolicy::SuccessiveRejects, 3)
        );
    }

    #[test]
    fn kinds_are_reported() {
        assert_eq!(UniformAllocator.kind(), IdentificationPolicy::Uniform);
        assert_eq!(
            SuccessiveRejects.kind(),
            IdentificationPolicy::SuccessiveRejects
        );
        assert_eq!(run_generic(&SuccessiveRejects, 1).policy, SuccessiveRejects.kind());
    }

    #[test]
    fn both_policies_find_a_clear_winner() {
        // Arm 2 barely correlates with anything, so arms 0 and 1 are far better.
        for seed in 0..5 {
            assert!(run_generic(&UniformAllocator, seed).best_arm < 2);
            assert!(run_generic(&SuccessiveRejects, seed).best_arm < 2);
        }
    }
}
