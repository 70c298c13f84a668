//! Running pairwise statistics (mean, population variance, Pearson correlation).
//!
//! Each [`ArmPair`] owns one [`PairStats`]. Batches are folded in by merging sufficient
//! statistics (count, means, centered second moments, centered co-moment) with the
//! pairwise-combination update of Chan, Golub & LeVeque, so raw samples never need to be
//! retained. [`PairStats::from_samples`] recomputes the same quantities from a full sample
//! in two passes; both routes agree to floating-point tolerance.
//!
//! Variances are population variances (`ddof = 0`), matching the analytic MSE formula in
//! [`crate::covariance`].

use std::collections::BTreeMap;

use crate::{Arm, ArmPair, Error};

/// Joint observations for one pair, columns ordered `(lo, hi)` like [`ArmPair::arms`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairSampleBatch {
    lo: Vec<f64>,
    hi: Vec<f64>,
}

impl PairSampleBatch {
    /// Build a batch from two equally long columns.
    pub fn new(lo: Vec<f64>, hi: Vec<f64>) -> Result<Self, Error> {
        if lo.len() != hi.len() {
            return Err(Error::InvalidModel(format!(
                "pair columns differ in length: {} vs {}",
                lo.len(),
                hi.len()
            )));
        }
        Ok(Self { lo, hi })
    }

    /// Build a batch from `(x_lo, x_hi)` rows.
    pub fn from_rows(rows: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (lo, hi) = rows.into_iter().unzip();
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.lo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lo.is_empty()
    }

    pub fn lo(&self) -> &[f64] {
        &self.lo
    }

    pub fn hi(&self) -> &[f64] {
        &self.hi
    }

    /// Iterate `(x_lo, x_hi)` rows.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lo.iter().copied().zip(self.hi.iter().copied())
    }

    /// Append another batch (the raw-retention strategy).
    pub fn extend(&mut self, other: &PairSampleBatch) {
        self.lo.extend_from_slice(&other.lo);
        self.hi.extend_from_slice(&other.hi);
    }
}

/// Summary statistics for one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairStats {
    count: u64,
    mean_lo: f64,
    mean_hi: f64,
    /// Σ (x_lo − mean_lo)²
    m2_lo: f64,
    /// Σ (x_hi − mean_hi)²
    m2_hi: f64,
    /// Σ (x_lo − mean_lo)(x_hi − mean_hi)
    co_moment: f64,
}

impl PairStats {
    /// Two-pass statistics over a complete sample.
    pub fn from_samples(batch: &PairSampleBatch) -> Self {
        let n = batch.len();
        if n == 0 {
            return Self::default();
        }
        let nf = n as f64;
        let mean_lo = batch.lo.iter().sum::<f64>() / nf;
        let mean_hi = batch.hi.iter().sum::<f64>() / nf;
        let mut m2_lo = 0.0;
        let mut m2_hi = 0.0;
        let mut co_moment = 0.0;
        for (x, y) in batch.iter() {
            let dx = x - mean_lo;
            let dy = y - mean_hi;
            m2_lo += dx * dx;
            m2_hi += dy * dy;
            co_moment += dx * dy;
        }
        Self {
            count: n as u64,
            mean_lo,
            mean_hi,
            m2_lo,
            m2_hi,
            co_moment,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &PairStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let d_lo = other.mean_lo - self.mean_lo;
        let d_hi = other.mean_hi - self.mean_hi;
        let w = na * nb / n;

        self.mean_lo += d_lo * nb / n;
        self.mean_hi += d_hi * nb / n;
        self.m2_lo += other.m2_lo + d_lo * d_lo * w;
        self.m2_hi += other.m2_hi + d_hi * d_hi * w;
        self.co_moment += other.co_moment + d_lo * d_hi * w;
        self.count += other.count;
    }

    /// Fold a raw batch into this summary.
    pub fn update(&mut self, batch: &PairSampleBatch) {
        self.merge(&Self::from_samples(batch));
    }

    /// Number of joint observations.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean_lo(&self) -> f64 {
        self.mean_lo
    }

    pub fn mean_hi(&self) -> f64 {
        self.mean_hi
    }

    /// Population variance of the `lo` arm (0 when empty).
    pub fn var_lo(&self) -> f64 {
        population(self.m2_lo, self.count)
    }

    /// Population variance of the `hi` arm (0 when empty).
    pub fn var_hi(&self) -> f64 {
        population(self.m2_hi, self.count)
    }

    /// Population covariance (0 when empty).
    pub fn covariance(&self) -> f64 {
        population(self.co_moment, self.count)
    }

    /// Pearson correlation, or `None` when either side has zero spread (including no data).
    pub fn correlation(&self) -> Option<f64> {
        if self.count == 0 || self.m2_lo <= 0.0 || self.m2_hi <= 0.0 {
            return None;
        }
        let r = self.co_moment / (self.m2_lo * self.m2_hi).sqrt();
        r.is_finite().then(|| r.clamp(-1.0, 1.0))
    }

    /// Mean of `arm`, which must be an endpoint of `pair`.
    pub fn mean_of(&self, pair: ArmPair, arm: Arm) -> Option<f64> {
        side(pair, arm).map(|lo| if lo { self.mean_lo } else { self.mean_hi })
    }

    /// Population variance of `arm`, which must be an endpoint of `pair`.
    pub fn variance_of(&self, pair: ArmPair, arm: Arm) -> Option<f64> {
        side(pair, arm).map(|lo| if lo { self.var_lo() } else { self.var_hi() })
    }
}

fn population(m2: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        (m2 / count as f64).max(0.0)
    }
}

/// `Some(true)` if `arm` is the pair's `lo` endpoint, `Some(false)` for `hi`.
fn side(pair: ArmPair, arm: Arm) -> Option<bool> {
    if arm == pair.lo() {
        Some(true)
    } else if arm == pair.hi() {
        Some(false)
    } else {
        None
    }
}

/// Per-pair statistics for one run, keyed by [`ArmPair`] in deterministic order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairStatsAccumulator {
    stats: BTreeMap<ArmPair, PairStats>,
}

impl PairStatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an empty summary for each of `pairs`.
    pub fn with_pairs(pairs: impl IntoIterator<Item = ArmPair>) -> Self {
        Self {
            stats: pairs
                .into_iter()
                .map(|p| (p, PairStats::default()))
                .collect(),
        }
    }

    /// Merge `batch` into the cumulative statistics for `pair` (creating them if absent).
    pub fn update(&mut self, pair: ArmPair, batch: &PairSampleBatch) {
        self.stats.entry(pair).or_default().update(batch);
    }

    pub fn get(&self, pair: &ArmPair) -> Option<&PairStats> {
        self.stats.get(pair)
    }

    pub fn contains(&self, pair: &ArmPair) -> bool {
        self.stats.contains_key(pair)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Pairs currently tracked, in order.
    pub fn pairs(&self) -> Vec<ArmPair> {
        self.stats.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArmPair, &PairStats)> + '_ {
        self.stats.iter()
    }

    /// Tracked pairs that include `arm`.
    pub fn involving(&self, arm: Arm) -> impl Iterator<Item = (&ArmPair, &PairStats)> + '_ {
        self.stats.iter().filter(move |(p, _)| p.contains(arm))
    }

    /// Drop every pair for which `keep` is false, along with its statistics.
    pub fn retain(&mut self, mut keep: impl FnMut(&ArmPair) -> bool) {
        self.stats.retain(|p, _| keep(p));
    }

    /// Joint observations accumulated over all tracked pairs.
    pub fn total_samples(&self) -> u64 {
        self.stats.values().map(PairStats::count).sum()
    }
}
