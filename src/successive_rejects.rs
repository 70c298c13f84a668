//! Successive Rejects for fixed-budget best-arm identification over pairwise estimates.
//!
//! The Audibert–Bubeck scheme, adapted so that the unit being sampled is a *pair* of arms
//! and the quantity being ranked is each arm's estimated MSE (see [`crate::estimate_arm_mse`]).
//!
//! ## Schedule
//!
//! With `P = K(K-1)/2` pairs and the normalizing constant
//!
//! ```text
//!   logbar(K) = (K-1)/2 + Σ_{j=1}^{K-2} 1/(K-j)
//! ```
//!
//! the cumulative per-pair sample count after phase `k = 1..K-1` is
//!
//! ```text
//!   n_k = ceil( (budget - P) / (logbar(K) · (K + 1 - k)) ),   n_0 = 0
//! ```
//!
//! and phase `k` draws `t_k = n_k - n_{k-1}` additional samples for every pair that still
//! touches an active arm. A phase with `t_k = 0` draws nothing and goes straight to
//! elimination.
//!
//! `budget` sizes the per-pair counts; it is not a cap on the total. Summed over active
//! pairs the run draws [`SuccessiveRejectsSchedule::planned_samples`], which
//! is larger than `budget` once `K ≥ 4` (about 1.2x at `K = 4`).
//!
//! ## Elimination
//!
//! Statistics accumulate across phases (never reset). At the end of each phase the active
//! arm with the largest estimated MSE is removed; among tied estimates the highest index
//! goes, so the lowest index survives (the same preference as uniform allocation's
//! arg-min). The removed arm's estimate is frozen, and pairs with no active endpoint are
//! dropped together with their statistics. After `K-1` phases one arm is left; it is
//! reported with the smallest estimate of the final phase.

use log::{debug, trace};

use crate::{
    accumulate_pair, argmax_highest_arm, estimate_mse_for, num_pairs, Arm, ArmPair,
    CorrelatedSource, Error, Identification, IdentificationPolicy, PairStatsAccumulator,
    PhaseRecord,
};

/// The Successive Rejects policy (see [`successive_rejects`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuccessiveRejects;

impl SuccessiveRejects {
    /// Shorthand for [`successive_rejects`].
    pub fn run<S: CorrelatedSource + ?Sized>(
        &self,
        source: &mut S,
        budget: u64,
    ) -> Result<Identification, Error> {
        successive_rejects(source, budget)
    }
}

/// Normalizing constant `logbar(K)` of the phase schedule.
pub fn log_bar(num_arms: usize) -> f64 {
    let k = num_arms as f64;
    let tail: f64 = (1..num_arms.saturating_sub(1))
        .map(|j| 1.0 / (num_arms - j) as f64)
        .sum();
    (k - 1.0) / 2.0 + tail
}

/// Precomputed per-phase sample allocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuccessiveRejectsSchedule {
    num_arms: usize,
    budget: u64,
    log_bar: f64,
    /// `n_1 ..= n_{K-1}`.
    cumulative: Vec<u64>,
}

impl SuccessiveRejectsSchedule {
    /// Build the schedule for `num_arms` arms and a total `budget`.
    ///
    /// Fails with [`Error::InvalidBudget`] if `budget < K(K-1)/2`.
    pub fn new(num_arms: usize, budget: u64) -> Result<Self, Error> {
        if num_arms < 2 {
            return Err(Error::InvalidModel(format!(
                "need at least 2 arms, got {num_arms}"
            )));
        }
        let pairs = num_pairs(num_arms);
        if budget < pairs {
            return Err(Error::InvalidBudget { budget, min: pairs });
        }
        let lb = log_bar(num_arms);
        let spare = (budget - pairs) as f64;
        let cumulative = (1..num_arms)
            .map(|k| (spare / (lb * (num_arms + 1 - k) as f64)).ceil() as u64)
            .collect();
        Ok(Self {
            num_arms,
            budget,
            log_bar: lb,
            cumulative,
        })
    }

    pub fn num_arms(&self) -> usize {
        self.num_arms
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn log_bar(&self) -> f64 {
        self.log_bar
    }

    /// Number of phases, `K - 1`.
    pub fn phases(&self) -> usize {
        self.cumulative.len()
    }

    /// Cumulative per-pair counts `n_1 ..= n_{K-1}` (non-decreasing).
    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    /// Per-phase increments `t_k = n_k - n_{k-1}`.
    pub fn increments(&self) -> Vec<u64> {
        let mut prev = 0u64;
        self.cumulative
            .iter()
            .map(|&n| {
                let t = n.saturating_sub(prev);
                prev = n;
                t
            })
            .collect()
    }

    /// Pairs still sampled in phase `k` (1-based): all pairs minus those among the `k-1`
    /// arms already eliminated.
    pub fn active_pairs_in_phase(&self, phase: usize) -> u64 {
        let gone = phase.saturating_sub(1) as u64;
        num_pairs(self.num_arms) - gone * gone.saturating_sub(1) / 2
    }

    /// Total joint draws the schedule implies over a full run.
    pub fn planned_samples(&self) -> u64 {
        self.increments()
            .iter()
            .enumerate()
            .map(|(i, &t)| t.saturating_mul(self.active_pairs_in_phase(i + 1)))
            .fold(0u64, u64::saturating_add)
    }
}

/// Run Successive Rejects against `source` with a total `budget`.
pub fn successive_rejects<S: CorrelatedSource + ?Sized>(
    source: &mut S,
    budget: u64,
) -> Result<Identification, Error> {
    let k = source.num_arms();
    let schedule = SuccessiveRejectsSchedule::new(k, budget)?;
    trace!(
        "successive rejects: k={k} budget={budget} log_bar={:.6} cumulative={:?}",
        schedule.log_bar(),
        schedule.cumulative()
    );

    let mut active: Vec<Arm> = (0..k).collect();
    let mut stats = PairStatsAccumulator::with_pairs(ArmPair::all(k));
    let mut mse = vec![0.0; k];
    let mut phases = Vec::with_capacity(schedule.phases());
    let mut samples_drawn = 0u64;

    for (idx, (&increment, &cumulative)) in schedule
        .increments()
        .iter()
        .zip(schedule.cumulative())
        .enumerate()
    {
        let phase = idx + 1;
        let pairs = stats.pairs();
        for &pair in &pairs {
            accumulate_pair(source, &mut stats, pair, increment)?;
            samples_drawn += increment;
        }

        let estimates = estimate_mse_for(&stats, &active)?;
        let rows: Vec<(Arm, f64)> = estimates.iter().map(|(&a, &m)| (a, m)).collect();
        let worst = argmax_highest_arm(&rows).ok_or(Error::IncompleteStatistics { arm: 0 })?;
        mse[worst] = estimates[&worst];

        let active_before = active.clone();
        active.retain(|&a| a != worst);
        stats.retain(|p| active.contains(&p.lo()) || active.contains(&p.hi()));
        debug!(
            "successive rejects phase {phase}/{}: +{increment} per pair over {} pairs, eliminated arm {worst} (mse {:.6})",
            schedule.phases(),
            pairs.len(),
            mse[worst]
        );

        if let [winner] = active.as_slice() {
            mse[*winner] = estimates.values().copied().fold(f64::INFINITY, f64::min);
        }

        phases.push(PhaseRecord {
            phase,
            increment,
            cumulative,
            active_arms: active_before,
            active_pairs: pairs.len(),
            estimates,
            eliminated: worst,
        });
    }

    let best_arm = match active.as_slice() {
        [winner] => *winner,
        _ => {
            return Err(Error::InvalidModel(format!(
                "elimination left {} arms",
                active.len()
            )))
        }
    };
    debug!("successive rejects: k={k} budget={budget} best_arm={best_arm} drawn={samples_drawn}");

    Ok(Identification {
        policy: IdentificationPolicy::SuccessiveRejects,
        best_arm,
        mse,
        samples_drawn,
        phases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CovarianceModel, GaussianSource};
    use proptest::prelude::*;

    fn ex0() -> CovarianceModel {
        CovarianceModel::new(vec![
            vec![1.0, 0.6, 0.2, 0.1],
            vec![0.6, 1.0, 0.1, 0.1],
            vec![0.2, 0.1, 1.0, 0.0],
            vec![0.1, 0.1, 0.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn log_bar_matches_closed_form() {
        assert!((log_bar(2) - 0.5).abs() < 1e-12);
        assert!((log_bar(3) - (1.0 + 0.5)).abs() < 1e-12);
        assert!((log_bar(4) - (1.5 + 1.0 / 3.0 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn schedule_for_four_arms() {
        let s = SuccessiveRejectsSchedule::new(4, 50_000).unwrap();
        let spare = 50_000.0 - 6.0;
        let lb = log_bar(4);
        let expected: Vec<u64> = [4.0, 3.0, 2.0]
            .iter()
            .map(|d| (spare / (lb * d)).ceil() as u64)
            .collect();
        assert_eq!(s.cumulative(), expected.as_slice());
        assert_eq!(s.phases(), 3);
        let inc = s.increments();
        assert_eq!(inc.iter().sum::<u64>(), *s.cumulative().last().unwrap());
        assert_eq!(s.active_pairs_in_phase(1), 6);
        assert_eq!(s.active_pairs_in_phase(2), 6);
        assert_eq!(s.active_pairs_in_phase(3), 5);
        assert_eq!(s.planned_samples(), 6 * inc[0] + 6 * inc[1] + 5 * inc[2]);
    }

    #[test]
    fn minimum_budget_gives_empty_phases() {
        let s = SuccessiveRejectsSchedule::new(5, 10).unwrap();
        assert_eq!(s.cumulative(), &[0, 0, 0, 0]);
        assert_eq!(s.planned_samples(), 0);
        assert_eq!(
            SuccessiveRejectsSchedule::new(5, 9),
            Err(Error::InvalidBudget { budget: 9, min: 10 })
        );
    }

    #[test]
    fn minimum_budget_still_terminates_with_lowest_index() {
        // No samples at all: every estimate ties at 0, highest index is eliminated each phase.
        let mut src = GaussianSource::new(ex0());
        let id = successive_rejects(&mut src, 6).unwrap();
        assert_eq!(id.samples_drawn, 0);
        assert_eq!(id.elimination_order(), vec![3, 2, 1, 0]);
        assert_eq!(id.best_arm, 0);
        assert_eq!(id.mse, vec![0.0; 4]);
    }

    #[test]
    fn rejects_budgets_below_one_sample_per_pair() {
        let mut src = GaussianSource::new(ex0());
        assert_eq!(
            successive_rejects(&mut src, 5),
            Err(Error::InvalidBudget { budget: 5, min: 6 })
        );
    }

    #[test]
    fn two_arms_run_a_single_phase() {
        let m = CovarianceModel::new(vec![vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        let mut src = GaussianSource::with_seed(m, 4);
        let id = SuccessiveRejects.run(&mut src, 500).unwrap();
        assert_eq!(id.phases.len(), 1);
        assert_eq!(id.phases[0].increment, 499);
        assert_eq!(id.samples_drawn, 499);
        assert!(id.best_arm < 2);
        let loser = id.phases[0].eliminated;
        assert_ne!(loser, id.best_arm);
        assert!(id.mse[id.best_arm] <= id.mse[loser]);
    }

    #[test]
    fn trace_is_consistent() {
        let mut src = GaussianSource::with_seed(ex0(), 8);
        let id = successive_rejects(&mut src, 20_000).unwrap();
        assert_eq!(id.phases.len(), 3);
        let mut expect_active: Vec<Arm> = (0..4).collect();
        for p in &id.phases {
            assert_eq!(p.active_arms, expect_active);
            assert_eq!(p.estimates.len(), expect_active.len());
            // The eliminated arm had the largest estimate of its phase.
            let worst = p.estimates[&p.eliminated];
            assert!(p.estimates.values().all(|&m| m <= worst + 1e-12));
            // Frozen estimate is the one from the elimination phase.
            assert_eq!(id.mse[p.eliminated], worst);
            expect_active.retain(|&a| a != p.eliminated);
        }
        assert_eq!(expect_active, vec![id.best_arm]);
        let last = id.phases.last().unwrap();
        assert_eq!(id.mse[id.best_arm], last.estimates[&id.best_arm]);
        let schedule = SuccessiveRejectsSchedule::new(4, 20_000).unwrap();
        assert_eq!(id.samples_drawn, schedule.planned_samples());
    }

    #[test]
    fn same_seed_same_result() {
        let a = successive_rejects(&mut GaussianSource::with_seed(ex0(), 77), 5_000).unwrap();
        let b = successive_rejects(&mut GaussianSource::with_seed(ex0(), 77), 5_000).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn schedule_is_non_decreasing(k in 2usize..12, extra in 0u64..100_000) {
            let budget = num_pairs(k) + extra;
            let s = SuccessiveRejectsSchedule::new(k, budget).unwrap();
            prop_assert_eq!(s.phases(), k - 1);
            for w in s.cumulative().windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
        }

        #[test]
        fn always_one_survivor(k in 2usize..7, extra in 0u64..400, seed in any::<u64>()) {
            let rows: Vec<Vec<f64>> = (0..k)
                .map(|i| (0..k).map(|j| if i == j { 1.0 + i as f64 * 0.1 } else { 0.2 }).collect())
                .collect();
            let m = CovarianceModel::new(rows).unwrap();
            let budget = num_pairs(k) + extra;
            let id = successive_rejects(&mut GaussianSource::with_seed(m, seed), budget).unwrap();
            prop_assert_eq!(id.phases.len(), k - 1);
            let mut order = id.elimination_order();
            prop_assert_eq!(order.len(), k);
            order.sort_unstable();
            prop_assert_eq!(order, (0..k).collect::<Vec<_>>());
            prop_assert!(id.mse.iter().all(|m| m.is_finite()));
        }
    }
}
