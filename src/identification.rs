//! Result envelope for a best-arm identification run.
//!
//! Experiment harnesses want a single, audit-friendly record of what a policy did that can be:
//! - scored (did it find a true best arm?)
//! - logged or printed (per-phase elimination trace)
//! - compared across policies without knowing which one produced it

use std::collections::BTreeMap;

use crate::{Arm, MseVector};

/// Which policy produced an identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum IdentificationPolicy {
    /// Even split of the budget over every pair, one estimate at the end.
    Uniform,
    /// Phased elimination of the worst-estimated arm.
    SuccessiveRejects,
}

impl IdentificationPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            IdentificationPolicy::Uniform => "uniform",
            IdentificationPolicy::SuccessiveRejects => "successive-rejects",
        }
    }
}

impl std::fmt::Display for IdentificationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One Successive Rejects phase.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseRecord {
    /// 1-based phase number.
    pub phase: usize,
    /// Additional joint samples drawn for every active pair this phase (may be 0).
    pub increment: u64,
    /// Cumulative samples per active pair after this phase.
    pub cumulative: u64,
    /// Arms active during the phase (before elimination), ascending.
    pub active_arms: Vec<Arm>,
    /// Pairs sampled this phase.
    pub active_pairs: usize,
    /// MSE estimates of the active arms at the end of the phase.
    pub estimates: BTreeMap<Arm, f64>,
    /// Arm removed at the end of the phase.
    pub eliminated: Arm,
}

/// Outcome of one identification run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identification {
    pub policy: IdentificationPolicy,
    /// The arm believed to have the lowest MSE.
    pub best_arm: Arm,
    /// Per-arm MSE estimates.
    ///
    /// Under Successive Rejects, eliminated arms carry the estimate frozen at their
    /// elimination phase (early eliminations saw few samples), and the winner carries the
    /// smallest estimate of the final phase.
    pub mse: MseVector,
    /// Joint draws actually taken from the source, summed over pairs.
    pub samples_drawn: u64,
    /// Elimination trace (empty for uniform allocation).
    pub phases: Vec<PhaseRecord>,
}

impl Identification {
    /// Whether the chosen arm is one of `best_arms`.
    pub fn is_correct(&self, best_arms: &[Arm]) -> bool {
        best_arms.contains(&self.best_arm)
    }

    /// Arms in elimination order (Successive Rejects only), followed by the winner.
    pub fn elimination_order(&self) -> Vec<Arm> {
        self.phases
            .iter()
            .map(|p| p.eliminated)
            .chain(std::iter::once(self.best_arm))
            .collect()
    }
}
