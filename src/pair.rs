//! Arm indices, unordered arm pairs, and deterministic arg-min / arg-max helpers.

use crate::Error;

/// Epsilon used for floating-point tie-breaking when ranking MSE values.
///
/// Values within this distance of the extremum are treated as tied and resolved by arm index.
pub const TIEBREAK_EPS: f64 = 1e-12;

/// An arm is identified by its index in `[0, K)`.
pub type Arm = usize;

/// Per-arm MSE values (estimated or analytic), indexed by arm.
pub type MseVector = Vec<f64>;

/// Number of unordered pairs among `num_arms` arms: `K(K-1)/2`.
#[must_use]
pub fn num_pairs(num_arms: usize) -> u64 {
    let k = num_arms as u64;
    k * k.saturating_sub(1) / 2
}

/// An unordered pair of distinct arms, stored normalized as `(lo, hi)` with `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmPair {
    lo: Arm,
    hi: Arm,
}

impl ArmPair {
    /// Build a pair from two distinct arms, in either order.
    pub fn new(a: Arm, b: Arm) -> Result<Self, Error> {
        if a == b {
            return Err(Error::InvalidPair { arm: a });
        }
        Ok(Self {
            lo: a.min(b),
            hi: a.max(b),
        })
    }

    /// All `K(K-1)/2` pairs in lexicographic order.
    pub fn all(num_arms: usize) -> Vec<ArmPair> {
        let mut out = Vec::with_capacity(num_pairs(num_arms) as usize);
        for lo in 0..num_arms {
            for hi in (lo + 1)..num_arms {
                out.push(ArmPair { lo, hi });
            }
        }
        out
    }

    pub fn lo(&self) -> Arm {
        self.lo
    }

    pub fn hi(&self) -> Arm {
        self.hi
    }

    /// Both endpoints as `[lo, hi]`, the column order used for pair samples.
    pub fn arms(&self) -> [Arm; 2] {
        [self.lo, self.hi]
    }

    pub fn contains(&self, arm: Arm) -> bool {
        self.lo == arm || self.hi == arm
    }

    /// The endpoint that is not `arm`, or `None` if `arm` is not in the pair.
    pub fn other(&self, arm: Arm) -> Option<Arm> {
        if arm == self.lo {
            Some(self.hi)
        } else if arm == self.hi {
            Some(self.lo)
        } else {
            None
        }
    }
}

/// Index of the smallest value; entries within [`TIEBREAK_EPS`] of the minimum tie and go to
/// the lowest index.
///
/// Returns `None` for an empty slice. NaN entries are never chosen unless every entry is NaN.
pub fn argmin_lowest_index(values: &[f64]) -> Option<Arm> {
    if values.is_empty() {
        return None;
    }
    let min = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::INFINITY, f64::min);
    values
        .iter()
        .position(|&v| v <= min + TIEBREAK_EPS)
        .or(Some(0))
}

/// Among `(arm, value)` rows, the arm with the largest value; entries within
/// [`TIEBREAK_EPS`] of the maximum tie and go to the highest arm index.
///
/// This is the elimination rule: discarding the highest index on ties leaves the lowest index
/// standing, consistent with [`argmin_lowest_index`].
pub fn argmax_highest_arm(rows: &[(Arm, f64)]) -> Option<Arm> {
    let max = rows
        .iter()
        .map(|r| r.1)
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    rows.iter()
        .filter(|&&(_, v)| v >= max - TIEBREAK_EPS)
        .map(|r| r.0)
        .max()
        .or_else(|| rows.iter().map(|r| r.0).max())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pairs_are_normalized_and_reject_self_pairs() {
        let p = ArmPair::new(3, 1).unwrap();
        assert_eq!((p.lo(), p.hi()), (1, 3));
        assert_eq!(p, ArmPair::new(1, 3).unwrap());
        assert_eq!(p.other(1), Some(3));
        assert_eq!(p.other(2), None);
        assert_eq!(ArmPair::new(2, 2), Err(Error::InvalidPair { arm: 2 }));
    }

    #[test]
    fn all_pairs_enumerates_lexicographically() {
        let pairs = ArmPair::all(4);
        assert_eq!(pairs.len() as u64, num_pairs(4));
        let flat: Vec<(usize, usize)> = pairs.iter().map(|p| (p.lo(), p.hi())).collect();
        assert_eq!(flat, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(ArmPair::all(1).is_empty());
    }

    #[test]
    fn argmin_breaks_ties_toward_lowest_index() {
        assert_eq!(argmin_lowest_index(&[2.0, 1.0, 1.0]), Some(1));
        assert_eq!(argmin_lowest_index(&[0.0, 0.0, 0.0]), Some(0));
        assert_eq!(argmin_lowest_index(&[f64::NAN, 3.0]), Some(1));
        assert_eq!(argmin_lowest_index(&[]), None);
    }

    #[test]
    fn argmax_breaks_ties_toward_highest_arm() {
        assert_eq!(argmax_highest_arm(&[(0, 1.0), (2, 5.0), (3, 5.0)]), Some(3));
        assert_eq!(argmax_highest_arm(&[(1, 0.0), (4, 0.0)]), Some(4));
        assert_eq!(argmax_highest_arm(&[(1, 9.0), (4, 0.0)]), Some(1));
        assert_eq!(argmax_highest_arm(&[]), None);
    }

    #[test]
    fn tolerance_is_measured_from_the_extremum_not_chained() {
        // Neighbours sit within the tolerance of each other, but only arm 0 is within it of
        // the true maximum.
        let rows = [
            (0, 1.0 + 2.7e-12),
            (1, 1.0 + 1.5e-12),
            (2, 1.0 + 0.9e-12),
            (3, 1.0),
        ];
        assert_eq!(argmax_highest_arm(&rows), Some(0));
        let near = [(0, 1.0 + 2.7e-12), (1, 1.0 + 1.8e-12), (2, 1.0 + 0.9e-12), (3, 1.0)];
        assert_eq!(argmax_highest_arm(&near), Some(1));

        let values = [1.0, 1.0 - 0.9e-12, 1.0 - 1.5e-12, 1.0 - 2.7e-12];
        assert_eq!(argmin_lowest_index(&values), Some(3));
        let values = [1.0, 1.0 - 0.9e-12, 1.0 - 1.8e-12, 1.0 - 2.7e-12];
        assert_eq!(argmin_lowest_index(&values), Some(2));
    }

    #[test]
    fn all_nan_inputs_fall_back_deterministically() {
        assert_eq!(argmin_lowest_index(&[f64::NAN, f64::NAN]), Some(0));
        assert_eq!(argmax_highest_arm(&[(2, f64::NAN), (5, f64::NAN)]), Some(5));
    }

    proptest! {
        #[test]
        fn argmin_is_a_minimum(values in proptest::collection::vec(-1.0e6f64..1.0e6f64, 1..16)) {
            let i = argmin_lowest_index(&values).unwrap();
            for &v in &values {
                prop_assert!(values[i] <= v + TIEBREAK_EPS);
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            // Nothing earlier is within the tolerance of the minimum.
            for &v in &values[..i] {
                prop_assert!(v > min + TIEBREAK_EPS);
            }
        }

        #[test]
        fn argmax_is_a_maximum(values in proptest::collection::vec(-1.0e6f64..1.0e6f64, 1..16)) {
            let rows: Vec<(Arm, f64)> = values.iter().copied().enumerate().collect();
            let w = argmax_highest_arm(&rows).unwrap();
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(values[w] >= max - TIEBREAK_EPS);
            // Nothing later is within the tolerance of the maximum.
            for &v in &values[w + 1..] {
                prop_assert!(v < max - TIEBREAK_EPS);
            }
        }
    }
}
