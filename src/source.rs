//! Sample sources: where joint observations of arms come from.
//!
//! Policies only talk to a [`CorrelatedSource`]; [`GaussianSource`] is the zero-mean
//! multivariate-normal implementation driven by a [`CovarianceModel`].
//!
//! Notes:
//! - Sources are **seedable** so a run is reproducible given its seed.
//! - Default construction uses a fixed seed (deterministic by default).
//! - Each concurrent run needs its own source; nothing here is shared across runs.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::BTreeMap;

use crate::{
    Arm, ArmPair, CovarianceModel, Error, MseVector, PairSampleBatch, PairStatsAccumulator,
};

/// Largest batch requested from a source in one call by [`accumulate_pair`].
pub const MAX_BATCH: usize = 1 << 16;

/// A generative model over K arms.
pub trait CorrelatedSource {
    /// Number of arms K.
    fn num_arms(&self) -> usize;

    /// Draw `size` i.i.d. joint observations of `arms`.
    ///
    /// Each returned row has one value per requested arm, in request order. Fails with
    /// [`Error::InvalidModel`] when `size < 1` or `arms` is empty or repeats an arm, and with
    /// [`Error::UnknownArm`] for an index outside `[0, K)`.
    fn sample(&mut self, arms: &[Arm], size: usize) -> Result<Vec<Vec<f64>>, Error>;

    /// Analytic per-arm MSE of the model.
    fn true_mse(&self) -> MseVector;

    /// Draw `size` joint observations of one pair, columns ordered `(lo, hi)`.
    fn sample_pair(&mut self, pair: ArmPair, size: usize) -> Result<PairSampleBatch, Error> {
        let rows = self.sample(&pair.arms(), size)?;
        Ok(PairSampleBatch::from_rows(rows.into_iter().map(|r| (r[0], r[1]))))
    }

    /// Draw `size` joint observations of every arm.
    fn sample_all(&mut self, size: usize) -> Result<Vec<Vec<f64>>, Error> {
        let arms: Vec<Arm> = (0..self.num_arms()).collect();
        self.sample(&arms, size)
    }
}

impl<S: CorrelatedSource + ?Sized> CorrelatedSource for &mut S {
    fn num_arms(&self) -> usize {
        (**self).num_arms()
    }

    fn sample(&mut self, arms: &[Arm], size: usize) -> Result<Vec<Vec<f64>>, Error> {
        (**self).sample(arms, size)
    }

    fn true_mse(&self) -> MseVector {
        (**self).true_mse()
    }

    fn sample_pair(&mut self, pair: ArmPair, size: usize) -> Result<PairSampleBatch, Error> {
        (**self).sample_pair(pair, size)
    }
}

/// Draw `count` joint samples of `pair` from `source` into `stats`, at most [`MAX_BATCH`]
/// per request, so memory stays bounded whatever the count.
pub fn accumulate_pair<S: CorrelatedSource + ?Sized>(
    source: &mut S,
    stats: &mut PairStatsAccumulator,
    pair: ArmPair,
    count: u64,
) -> Result<(), Error> {
    let mut left = count;
    while left > 0 {
        let size = usize::try_from(left).map_or(MAX_BATCH, |n| n.min(MAX_BATCH));
        let batch = source.sample_pair(pair, size)?;
        stats.update(pair, &batch);
        left -= size as u64;
    }
    Ok(())
}

fn reserve<T>(size: usize) -> Result<Vec<T>, Error> {
    let mut out = Vec::new();
    out.try_reserve_exact(size).map_err(|_| {
        Error::InvalidConfig(format!("cannot allocate a batch of {size} samples"))
    })?;
    Ok(out)
}

/// Seedable zero-mean Gaussian source.
///
/// Draws are `x = F·z` with `z ~ N(0, I)` and `F·Fᵀ` the requested sub-covariance (see
/// [`CovarianceModel`] for how `F` is built). Factors are cached per requested arm list.
#[derive(Debug, Clone)]
pub struct GaussianSource {
    model: CovarianceModel,
    rng: StdRng,
    factors: BTreeMap<Vec<Arm>, DMatrix<f64>>,
}

impl GaussianSource {
    /// Create a source with a deterministic fixed seed (0).
    pub fn new(model: CovarianceModel) -> Self {
        Self::with_seed(model, 0)
    }

    /// Create a source with a fixed seed (reproducible).
    pub fn with_seed(model: CovarianceModel, seed: u64) -> Self {
        Self {
            model,
            rng: StdRng::seed_from_u64(seed),
            factors: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &CovarianceModel {
        &self.model
    }

    fn check_request(&self, arms: &[Arm], size: usize) -> Result<(), Error> {
        if size < 1 {
            return Err(Error::InvalidModel(
                "sample size must be at least 1".to_string(),
            ));
        }
        if arms.is_empty() {
            return Err(Error::InvalidModel(
                "sample request names no arms".to_string(),
            ));
        }
        let k = self.model.num_arms();
        let mut seen = vec![false; k];
        for &a in arms {
            if a >= k {
                return Err(Error::UnknownArm { arm: a, num_arms: k });
            }
            if std::mem::replace(&mut seen[a], true) {
                return Err(Error::InvalidModel(format!(
                    "sample request repeats arm {a}"
                )));
            }
        }
        Ok(())
    }

    /// Hand each of `size` joint draws of an already checked `arms` to `emit` (one reused row
    /// buffer).
    fn draw(
        &mut self,
        arms: &[Arm],
        size: usize,
        mut emit: impl FnMut(&[f64]),
    ) -> Result<(), Error> {
        if !self.factors.contains_key(arms) {
            let l = self.model.factor_for(arms)?;
            self.factors.insert(arms.to_vec(), l);
        }
        let Some(f) = self.factors.get(arms) else {
            return Err(Error::InvalidModel(format!(
                "no factor available for arms {arms:?}"
            )));
        };

        let n = arms.len();
        let mut z = DVector::<f64>::zeros(n);
        let mut row = DVector::<f64>::zeros(n);
        for _ in 0..size {
            for zi in z.iter_mut() {
                *zi = self.rng.sample(StandardNormal);
            }
            f.mul_to(&z, &mut row);
            emit(row.as_slice());
        }
        Ok(())
    }
}

impl CorrelatedSource for GaussianSource {
    fn num_arms(&self) -> usize {
        self.model.num_arms()
    }

    fn sample(&mut self, arms: &[Arm], size: usize) -> Result<Vec<Vec<f64>>, Error> {
        self.check_request(arms, size)?;
        let mut out = reserve(size)?;
        self.draw(arms, size, |row| out.push(row.to_vec()))?;
        Ok(out)
    }

    fn sample_pair(&mut self, pair: ArmPair, size: usize) -> Result<PairSampleBatch, Error> {
        self.check_request(&pair.arms(), size)?;
        let mut lo = reserve(size)?;
        let mut hi = reserve(size)?;
        self.draw(&pair.arms(), size, |row| {
            lo.push(row[0]);
            hi.push(row[1]);
        })?;
        PairSampleBatch::new(lo, hi)
    }

    fn true_mse(&self) -> MseVector {
        self.model.true_mse()
    }
}
