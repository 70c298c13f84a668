//! Plug-in MSE estimates from accumulated pair statistics.
//!
//! For arm `i`, every tracked pair `(i, p)` contributes the residual variance of the partner:
//!
//! ```text
//!   estimate(i) = Σ_{(i,p) tracked} Var_est(p) · (1 − ρ_est(p, i)²)
//! ```
//!
//! This is the analytic formula of [`crate::CovarianceModel::true_mse`] with sample
//! estimates substituted for the true parameters.
//!
//! Degenerate pairs: when a pair's correlation is undefined (no data, or zero spread on
//! either side) it is taken as `ρ = 0`, so the pair contributes its full `Var_est(p)`. A pair
//! with no observations therefore contributes exactly `0`. Both policies share this rule.

use std::collections::BTreeMap;

use crate::{Arm, Error, MseVector, PairStatsAccumulator};

/// Estimated MSE of a single arm over every tracked pair that involves it.
///
/// Fails with [`Error::IncompleteStatistics`] if no tracked pair involves `arm`.
pub fn estimate_arm_mse(stats: &PairStatsAccumulator, arm: Arm) -> Result<f64, Error> {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (pair, s) in stats.involving(arm) {
        let Some(partner) = pair.other(arm) else {
            continue;
        };
        let var_p = s.variance_of(*pair, partner).unwrap_or(0.0);
        let rho = s.correlation().unwrap_or(0.0);
        total += var_p * (1.0 - rho * rho);
        pairs += 1;
    }
    if pairs == 0 {
        return Err(Error::IncompleteStatistics { arm });
    }
    Ok(total)
}

/// Estimated MSE for every arm in `[0, num_arms)`.
pub fn estimate_mse(stats: &PairStatsAccumulator, num_arms: usize) -> Result<MseVector, Error> {
    (0..num_arms)
        .map(|arm| estimate_arm_mse(stats, arm))
        .collect()
}

/// Estimated MSE restricted to `arms` (e.g. the still-active arms of an elimination run).
pub fn estimate_mse_for(
    stats: &PairStatsAccumulator,
    arms: &[Arm],
) -> Result<BTreeMap<Arm, f64>, Error> {
    arms.iter()
        .map(|&arm| estimate_arm_mse(stats, arm).map(|m| (arm, m)))
        .collect()
}
