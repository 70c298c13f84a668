//! Validated covariance models and the analytic per-arm MSE they imply.
//!
//! A [`CovarianceModel`] is the ground truth of an experiment: a K×K symmetric
//! positive-semi-definite matrix over arms. For arm `i`, the error of estimating it from
//! comparisons against every other arm is
//!
//! ```text
//!   MSE(i) = Σ_{p≠i} Var(p) · (1 − ρ(p, i)²),   ρ(p, i) = Σ_pi / sqrt(Σ_pp Σ_ii)
//! ```
//!
//! i.e. the residual variance of each partner after regressing out arm `i`.
//!
//! Notes:
//! - PSD is checked on the smallest eigenvalue, so singular (e.g. perfectly correlated)
//!   models are accepted.
//! - Sampling factors are Cholesky factors when the sub-covariance is positive definite,
//!   and `V·sqrt(Λ)` from the eigendecomposition otherwise.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};

use crate::{argmin_lowest_index, Arm, Error, MseVector};

/// Relative tolerance for the symmetry check.
const SYMMETRY_TOL: f64 = 1e-9;

/// Smallest eigenvalue allowed, relative to the largest variance.
const PSD_EIGEN_TOL: f64 = 1e-9;

/// Immutable K×K covariance matrix over arms.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceModel {
    matrix: DMatrix<f64>,
}

impl CovarianceModel {
    /// Build a model from row vectors.
    ///
    /// Fails with [`Error::InvalidModel`] unless the matrix is square with at least two
    /// arms, finite, symmetric, has strictly positive variances, and is positive
    /// semi-definite.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, Error> {
        let k = rows.len();
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != k) {
            return Err(Error::InvalidModel(format!(
                "covariance must be square: row {i} has {} entries, expected {k}",
                r.len()
            )));
        }
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Self::from_row_major(k, &data)
    }

    /// Build a model from a row-major buffer of `num_arms * num_arms` entries.
    pub fn from_row_major(num_arms: usize, data: &[f64]) -> Result<Self, Error> {
        if num_arms < 2 {
            return Err(Error::InvalidModel(format!(
                "need at least 2 arms, got {num_arms}"
            )));
        }
        if data.len() != num_arms * num_arms {
            return Err(Error::InvalidModel(format!(
                "expected {} entries for {num_arms} arms, got {}",
                num_arms * num_arms,
                data.len()
            )));
        }
        if let Some(pos) = data.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidModel(format!(
                "non-finite entry at ({}, {})",
                pos / num_arms,
                pos % num_arms
            )));
        }
        Self::from_matrix(DMatrix::from_row_slice(num_arms, num_arms, data))
    }

    fn from_matrix(matrix: DMatrix<f64>) -> Result<Self, Error> {
        let k = matrix.nrows();
        for i in 0..k {
            if matrix[(i, i)] <= 0.0 {
                return Err(Error::InvalidModel(format!(
                    "variance of arm {i} must be positive, got {}",
                    matrix[(i, i)]
                )));
            }
            for j in (i + 1)..k {
                let (a, b) = (matrix[(i, j)], matrix[(j, i)]);
                let scale = 1.0_f64.max(a.abs()).max(b.abs());
                if (a - b).abs() > SYMMETRY_TOL * scale {
                    return Err(Error::InvalidModel(format!(
                        "matrix is not symmetric at ({i}, {j}): {a} vs {b}"
                    )));
                }
            }
        }
        let scale = matrix.diagonal().max();
        let min_eigen = SymmetricEigen::new(matrix.clone()).eigenvalues.min();
        if min_eigen < -PSD_EIGEN_TOL * scale {
            return Err(Error::InvalidModel(format!(
                "matrix is not positive semi-definite (smallest eigenvalue {min_eigen:.3e})"
            )));
        }
        Ok(Self { matrix })
    }

    pub fn num_arms(&self) -> usize {
        self.matrix.nrows()
    }

    /// Covariance between arms `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn covariance(&self, i: Arm, j: Arm) -> f64 {
        self.matrix[(i, j)]
    }

    /// Variance of arm `i`.
    pub fn variance(&self, i: Arm) -> f64 {
        self.covariance(i, i)
    }

    /// Normalized correlation between arms `i` and `j`.
    pub fn correlation(&self, i: Arm, j: Arm) -> f64 {
        if i == j {
            return 1.0;
        }
        self.covariance(i, j) / (self.variance(i) * self.variance(j)).sqrt()
    }

    /// The full normalized correlation matrix (unit diagonal).
    pub fn correlation_matrix(&self) -> DMatrix<f64> {
        let k = self.num_arms();
        DMatrix::from_fn(k, k, |i, j| self.correlation(i, j))
    }

    /// Analytic per-arm MSE.
    pub fn true_mse(&self) -> MseVector {
        let k = self.num_arms();
        let rho = self.correlation_matrix();
        (0..k)
            .map(|i| {
                (0..k)
                    .filter(|&p| p != i)
                    .map(|p| self.variance(p) * (1.0 - rho[(p, i)] * rho[(p, i)]))
                    .sum()
            })
            .collect()
    }

    /// Arms whose true MSE is within `tol` of the minimum (ascending).
    ///
    /// More than one arm is returned when the best arm is not unique (e.g. a two-arm model
    /// with equal variances); a trial that picks any of them counts as a success.
    pub fn best_arms(&self, tol: f64) -> Vec<Arm> {
        let mse = self.true_mse();
        let Some(best) = argmin_lowest_index(&mse) else {
            return Vec::new();
        };
        let tol = tol.max(0.0);
        mse.iter()
            .enumerate()
            .filter(|(_, &m)| m <= mse[best] + tol)
            .map(|(i, _)| i)
            .collect()
    }

    /// Relabel arms: arm `i` of the result is arm `perm[i]` of `self`.
    pub fn permuted(&self, perm: &[Arm]) -> Result<Self, Error> {
        let k = self.num_arms();
        if perm.len() != k {
            return Err(Error::InvalidModel(format!(
                "permutation has {} entries, expected {k}",
                perm.len()
            )));
        }
        let mut seen = vec![false; k];
        for &p in perm {
            if p >= k {
                return Err(Error::UnknownArm { arm: p, num_arms: k });
            }
            if std::mem::replace(&mut seen[p], true) {
                return Err(Error::InvalidModel(format!(
                    "permutation repeats arm {p}"
                )));
            }
        }
        Ok(Self {
            matrix: self.sub_matrix(perm),
        })
    }

    fn sub_matrix(&self, arms: &[Arm]) -> DMatrix<f64> {
        let n = arms.len();
        DMatrix::from_fn(n, n, |a, b| self.covariance(arms[a], arms[b]))
    }

    /// A factor `F` (`arms.len()` square) with `F·Fᵀ` equal to the sub-covariance over
    /// `arms`, so `F·z` with `z ~ N(0, I)` has that covariance.
    pub(crate) fn factor_for(&self, arms: &[Arm]) -> Result<DMatrix<f64>, Error> {
        if let Some(&arm) = arms.iter().find(|&&a| a >= self.num_arms()) {
            return Err(Error::UnknownArm {
                arm,
                num_arms: self.num_arms(),
            });
        }
        let sub = self.sub_matrix(arms);
        // A zero pivot can slip through the decomposition and leave NaN below it.
        if let Some(l) = Cholesky::new(sub.clone())
            .map(|c| c.l())
            .filter(|l| l.iter().all(|x| x.is_finite()))
        {
            return Ok(l);
        }
        let eigen = SymmetricEigen::new(sub);
        let scale = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
        let factor = &eigen.eigenvectors * DMatrix::from_diagonal(&scale);
        if factor.iter().all(|x| x.is_finite()) {
            Ok(factor)
        } else {
            Err(Error::InvalidModel(format!(
                "no sampling factor for arms {arms:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn ex0() -> CovarianceModel {
        CovarianceModel::new(vec![
            vec![1.0, 0.6, 0.2, 0.1],
            vec![0.6, 1.0, 0.1, 0.1],
            vec![0.2, 0.1, 1.0, 0.0],
            vec![0.1, 0.1, 0.0, 1.0],
        ])
        .unwrap()
    }

    fn assert_reproduces(m: &CovarianceModel, arms: &[Arm]) {
        let f = m.factor_for(arms).unwrap();
        let product = &f * f.transpose();
        for (a, &i) in arms.iter().enumerate() {
            for (b, &j) in arms.iter().enumerate() {
                assert!(
                    (product[(a, b)] - m.covariance(i, j)).abs() < 1e-9,
                    "arms={arms:?} ({i}, {j})"
                );
            }
        }
    }

    #[test]
    fn rejects_malformed_matrices() {
        let cases = vec![
            vec![vec![1.0]],
            vec![vec![1.0, 0.5], vec![0.5]],
            vec![vec![1.0, 0.5], vec![0.4, 1.0]],
            vec![vec![0.0, 0.0], vec![0.0, 1.0]],
            vec![vec![1.0, f64::NAN], vec![f64::NAN, 1.0]],
            // |rho| > 1
            vec![vec![1.0, 2.0], vec![2.0, 1.0]],
            // Pairwise fine, jointly indefinite.
            vec![
                vec![1.0, 0.9, -0.9],
                vec![0.9, 1.0, 0.9],
                vec![-0.9, 0.9, 1.0],
            ],
        ];
        for rows in cases {
            let r = CovarianceModel::new(rows.clone());
            assert!(
                matches!(r, Err(Error::InvalidModel(_))),
                "{rows:?} should be rejected, got {r:?}"
            );
        }
        assert!(matches!(
            CovarianceModel::from_row_major(2, &[1.0, 0.0, 0.0]),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn accepts_singular_psd_matrices() {
        // Perfectly correlated arms: rank one, no Cholesky factor.
        let m = CovarianceModel::new(vec![vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(m.true_mse(), vec![0.0, 0.0]);
        assert_reproduces(&m, &[0, 1]);
        assert_reproduces(&m, &[1, 0]);

        let m = CovarianceModel::new(vec![
            vec![1.0, 1.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![0.0, 0.0, 2.0],
        ])
        .unwrap();
        assert_reproduces(&m, &[0, 1, 2]);
        assert_reproduces(&m, &[2, 0]);
    }

    #[test]
    fn ex0_true_mse_matches_hand_computation() {
        let mse = ex0().true_mse();
        let expected0 = (1.0 - 0.36) + (1.0 - 0.04) + (1.0 - 0.01);
        assert!((mse[0] - expected0).abs() < 1e-12, "mse={mse:?}");
        assert_eq!(argmin_lowest_index(&mse), Some(0));
        assert_eq!(ex0().best_arms(1e-9), vec![0]);
    }

    #[test]
    fn correlation_normalizes_by_variances() {
        let m = CovarianceModel::new(vec![vec![4.0, 1.0], vec![1.0, 9.0]]).unwrap();
        assert!((m.correlation(0, 1) - 1.0 / 6.0).abs() < 1e-12);
        let rho = m.correlation_matrix();
        assert_eq!(rho[(0, 0)], 1.0);
        assert_eq!(rho[(1, 1)], 1.0);
        assert_eq!(rho[(0, 1)], rho[(1, 0)]);
        let mse = m.true_mse();
        let rho2 = 1.0 / 36.0;
        assert!((mse[0] - 9.0 * (1.0 - rho2)).abs() < 1e-12);
        assert!((mse[1] - 4.0 * (1.0 - rho2)).abs() < 1e-12);
    }

    #[test]
    fn two_arm_models_have_a_tied_best_arm() {
        let m = CovarianceModel::new(vec![vec![2.0, 0.8], vec![0.8, 2.0]]).unwrap();
        let mse = m.true_mse();
        let rho = 0.4;
        assert!((mse[0] - 2.0 * (1.0 - rho * rho)).abs() < 1e-12);
        assert!((mse[0] - mse[1]).abs() < 1e-12);
        assert_eq!(m.best_arms(1e-9), vec![0, 1]);
    }

    #[test]
    fn factor_reproduces_sub_covariance() {
        let m = ex0();
        assert_reproduces(&m, &[3, 0, 2]);
        assert_reproduces(&m, &[0, 1, 2, 3]);
        assert_eq!(
            m.factor_for(&[0, 4]),
            Err(Error::UnknownArm { arm: 4, num_arms: 4 })
        );
    }

    fn random_model() -> impl Strategy<Value = CovarianceModel> {
        // Gram matrices B·Bᵀ + diag are always PSD with positive diagonal.
        (2usize..6).prop_flat_map(|k| {
            proptest::collection::vec(-2.0f64..2.0, k * k).prop_map(move |b| {
                let b = DMatrix::from_row_slice(k, k, &b);
                let gram = &b * b.transpose() + DMatrix::identity(k, k) * 0.1;
                let rows = gram.row_iter().map(|r| r.iter().copied().collect()).collect();
                CovarianceModel::new(rows).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn true_mse_is_permutation_equivariant(
            m in random_model(),
            shuffle_seed in any::<u64>(),
        ) {
            let k = m.num_arms();
            let mut perm: Vec<usize> = (0..k).collect();
            perm.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));
            let base = m.true_mse();
            let relabeled = m.permuted(&perm).unwrap().true_mse();
            for i in 0..k {
                prop_assert!((relabeled[i] - base[perm[i]]).abs() < 1e-9 * (1.0 + base[perm[i]].abs()));
            }
        }

        #[test]
        fn true_mse_is_non_negative(m in random_model()) {
            for v in m.true_mse() {
                prop_assert!(v >= -1e-9);
            }
        }
    }
}
