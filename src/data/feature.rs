//! Features and feature values.
//!
//! A [`Feature`] is one attribute column. It owns the vocabulary of
//! [`FeatureValue`]s observed during training, the frequency and
//! target-distribution bookkeeping behind the information-theoretic
//! statistics, and (for storable metrics) the prestored pairwise distance
//! matrix.
//!
//! Index 0 of every feature's value table is the reserved unknown sentinel:
//! it has no name, frequency 0, and an empty target distribution. Query
//! resolution maps unseen symbols onto it so metric kernels can branch on
//! `is_unknown` cheaply.

use std::collections::HashMap;

use ndarray::Array2;

use crate::data::distribution::ClassDistribution;
use crate::data::matrix::SymmetricMatrix;
use crate::data::targets::Targets;
use crate::interner::StringInterner;
use crate::metric::{self, MetricKind};

/// Feature-level errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    /// A storable metric was queried before its matrix was built.
    #[error("value-difference matrix has not been built for this feature")]
    MatrixNotBuilt,

    /// Storable metrics are defined over symbolic values only.
    #[error("storable metric {0} cannot apply to a numeric feature")]
    StorableOnNumeric(MetricKind),

    /// `store_matrix` was asked to prestore a non-storable metric.
    #[error("metric {0} is not storable")]
    NotStorable(MetricKind),

    /// A matrix read from persistent form has the wrong dimension.
    #[error("matrix dimension {got} does not match value count {expected}")]
    MatrixShape { expected: usize, got: usize },
}

/// Result of numeric preparation for one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericStatus {
    /// The feature has no values at all.
    Empty,
    /// Every value parsed as a number; the range is set.
    Numeric,
    /// A value failed to parse as a number.
    NotNumeric(String),
}

/// One symbolic (or numerically interpreted) value of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValue {
    name_id: usize,
    index: usize,
    frequency: u64,
    numeric: Option<f64>,
    target_dist: ClassDistribution,
}

impl FeatureValue {
    /// Interned name id (0 for the unknown sentinel).
    pub fn name_id(&self) -> usize {
        self.name_id
    }

    /// Dense index within the feature (0 is the unknown sentinel).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of training instances carrying this value.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Numeric interpretation, set by `prepare_numeric_stats`.
    pub fn numeric(&self) -> Option<f64> {
        self.numeric
    }

    /// How training instances with this value distribute over targets.
    pub fn target_dist(&self) -> &ClassDistribution {
        &self.target_dist
    }

    /// True for the reserved unknown sentinel.
    pub fn is_unknown(&self) -> bool {
        self.index == 0
    }

    /// Resolve the value text.
    pub fn name<'a>(&self, interner: &'a StringInterner) -> Option<&'a str> {
        interner.resolve(self.name_id)
    }
}

/// One attribute column.
#[derive(Debug, Clone)]
pub struct Feature {
    ignore: bool,
    numeric: bool,
    metric_override: Option<MetricKind>,
    entropy: f64,
    info_gain: f64,
    split_info: f64,
    gain_ratio: f64,
    chi_square: f64,
    shared_variance: f64,
    standard_deviation: f64,
    weight: f64,
    n_min: f64,
    n_max: f64,
    matrix_clip_freq: u64,
    values: Vec<FeatureValue>,
    by_name: HashMap<usize, usize>,
    matrix: Option<SymmetricMatrix>,
}

impl Default for Feature {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature {
    /// Create an empty feature holding only the unknown sentinel.
    pub fn new() -> Self {
        Self {
            ignore: false,
            numeric: false,
            metric_override: None,
            entropy: 0.0,
            info_gain: 0.0,
            split_info: 0.0,
            gain_ratio: 0.0,
            chi_square: 0.0,
            shared_variance: 0.0,
            standard_deviation: 0.0,
            weight: 0.0,
            n_min: 0.0,
            n_max: 0.0,
            matrix_clip_freq: 10,
            values: vec![FeatureValue {
                name_id: 0,
                index: 0,
                frequency: 0,
                numeric: None,
                target_dist: ClassDistribution::new(),
            }],
            by_name: HashMap::new(),
            matrix: None,
        }
    }

    // =========================================================================
    // Value management
    // =========================================================================

    /// Register a value occurrence: creates the value on first sight (dense
    /// indices from 1 onward), then bumps its frequency and its target
    /// distribution by `freq`. Returns the dense value index.
    pub fn add_value(&mut self, name_id: usize, target: usize, freq: u64) -> usize {
        let idx = match self.by_name.get(&name_id) {
            Some(&idx) => idx,
            None => {
                let idx = self.values.len();
                self.values.push(FeatureValue {
                    name_id,
                    index: idx,
                    frequency: 0,
                    numeric: None,
                    target_dist: ClassDistribution::new(),
                });
                self.by_name.insert(name_id, idx);
                idx
            }
        };
        let fv = &mut self.values[idx];
        fv.frequency += freq;
        fv.target_dist.inc_freq(target, freq);
        idx
    }

    /// Bump an existing value's frequency and target count by one.
    pub fn increment_value(&mut self, idx: usize, target: usize) -> bool {
        match self.values.get_mut(idx) {
            Some(fv) if idx != 0 => {
                fv.frequency += 1;
                fv.target_dist.inc_freq(target, 1);
                true
            }
            _ => false,
        }
    }

    /// Drop an existing value's frequency and target count by one. The value
    /// itself is never removed; indices are stable.
    pub fn decrement_value(&mut self, idx: usize, target: usize) -> bool {
        match self.values.get_mut(idx) {
            Some(fv) if idx != 0 && fv.frequency > 0 => {
                fv.frequency -= 1;
                fv.target_dist.dec_freq(target);
                true
            }
            _ => false,
        }
    }

    /// Dense index of a value by interned name id.
    pub fn lookup(&self, name_id: usize) -> Option<usize> {
        self.by_name.get(&name_id).copied()
    }

    /// Value by dense index.
    pub fn value(&self, idx: usize) -> Option<&FeatureValue> {
        self.values.get(idx)
    }

    /// The reserved unknown sentinel.
    pub fn unknown_value(&self) -> &FeatureValue {
        &self.values[0]
    }

    /// Iterate real values (the unknown sentinel excluded) in index order.
    pub fn iter_values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.values.iter().skip(1)
    }

    /// Number of real values with non-zero frequency.
    pub fn effective_values(&self) -> usize {
        self.iter_values().filter(|fv| fv.frequency > 0).count()
    }

    /// Number of real values, including zero-frequency ones.
    pub fn total_values(&self) -> usize {
        self.values.len() - 1
    }

    /// Length of the value table including the unknown sentinel; this is the
    /// dimension of a stored matrix.
    pub fn table_len(&self) -> usize {
        self.values.len()
    }

    /// Sum of all value frequencies (= training instance count for a
    /// non-ignored feature).
    pub fn training_total(&self) -> u64 {
        self.iter_values().map(|fv| fv.frequency).sum()
    }

    // =========================================================================
    // Flags, metric, scalar stats
    // =========================================================================

    /// Whether this feature is excluded from distance computation.
    pub fn ignored(&self) -> bool {
        self.ignore
    }

    /// Mark this feature ignored.
    pub fn set_ignored(&mut self, ignore: bool) {
        self.ignore = ignore;
    }

    /// Whether values carry a numeric interpretation.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Declare the feature numeric (driven by the effective metric).
    pub fn set_numeric(&mut self, numeric: bool) {
        self.numeric = numeric;
    }

    /// Per-feature metric override.
    pub fn metric_override(&self) -> Option<MetricKind> {
        self.metric_override
    }

    /// Set a per-feature metric override.
    pub fn set_metric_override(&mut self, metric: Option<MetricKind>) {
        self.metric_override = metric;
    }

    /// The metric this feature measures with, given the global choice.
    pub fn effective_metric(&self, global: MetricKind) -> MetricKind {
        self.metric_override.unwrap_or(global)
    }

    /// Entropy of the feature's value distribution.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Information gain over the target entropy.
    pub fn info_gain(&self) -> f64 {
        self.info_gain
    }

    /// Split info (entropy of the value partition).
    pub fn split_info(&self) -> f64 {
        self.split_info
    }

    /// Gain ratio: info gain over split info.
    pub fn gain_ratio(&self) -> f64 {
        self.gain_ratio
    }

    /// Chi-squared statistic of the value/target contingency table.
    pub fn chi_square(&self) -> f64 {
        self.chi_square
    }

    /// Shared variance (Cramér's-V-squared style normalization of chi2).
    pub fn shared_variance(&self) -> f64 {
        self.shared_variance
    }

    /// Standard deviation of numeric values (0 for symbolic features).
    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    /// The search weight of this feature.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the search weight.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Smallest numeric value seen.
    pub fn n_min(&self) -> f64 {
        self.n_min
    }

    /// Largest numeric value seen.
    pub fn n_max(&self) -> f64 {
        self.n_max
    }

    /// Set the numeric range (used by deserialization).
    pub fn set_numeric_range(&mut self, n_min: f64, n_max: f64) {
        self.n_min = n_min;
        self.n_max = n_max;
    }

    /// Width of the numeric range.
    pub fn numeric_range(&self) -> f64 {
        self.n_max - self.n_min
    }

    /// Values below this frequency are left out of a stored matrix.
    pub fn matrix_clip_freq(&self) -> u64 {
        self.matrix_clip_freq
    }

    /// Set the matrix clip frequency.
    pub fn set_matrix_clip_freq(&mut self, clip: u64) {
        self.matrix_clip_freq = clip;
    }

    // =========================================================================
    // Numeric preparation
    // =========================================================================

    /// Parse every value name as a number and record the numeric range.
    pub fn prepare_numeric_stats(&mut self, interner: &StringInterner) -> NumericStatus {
        if self.values.len() == 1 {
            return NumericStatus::Empty;
        }
        let mut n_min = f64::INFINITY;
        let mut n_max = f64::NEG_INFINITY;
        for idx in 1..self.values.len() {
            let name_id = self.values[idx].name_id;
            let parsed = interner
                .resolve(name_id)
                .and_then(|name| name.parse::<f64>().ok());
            match parsed {
                Some(v) => {
                    self.values[idx].numeric = Some(v);
                    n_min = n_min.min(v);
                    n_max = n_max.max(v);
                }
                None => {
                    let name = interner.resolve(name_id).unwrap_or("").to_string();
                    return NumericStatus::NotNumeric(name);
                }
            }
        }
        self.n_min = n_min;
        self.n_max = n_max;
        NumericStatus::Numeric
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Compute all per-feature statistics after training.
    ///
    /// `target_entropy` is the entropy of the full target distribution;
    /// `bin_size` is the number of equal-width bins used to discretize
    /// numeric features for the entropy-based statistics.
    pub fn statistics(&mut self, target_entropy: f64, targets: &Targets, bin_size: usize) {
        if self.ignore {
            return;
        }
        let (entropy_stats, chi_stats) = if self.numeric {
            let rows = self.numeric_bins(bin_size);
            let refs: Vec<(u64, &ClassDistribution)> =
                rows.iter().map(|(f, d)| (*f, d)).collect();
            (
                Self::entropy_statistics(target_entropy, &refs),
                Self::chi_square_statistics(targets, &refs),
            )
        } else {
            let rows: Vec<(u64, &ClassDistribution)> = self
                .values
                .iter()
                .skip(1)
                .filter(|fv| fv.frequency > 0)
                .map(|fv| (fv.frequency, &fv.target_dist))
                .collect();
            (
                Self::entropy_statistics(target_entropy, &rows),
                Self::chi_square_statistics(targets, &rows),
            )
        };
        (self.entropy, self.split_info, self.info_gain, self.gain_ratio) = entropy_stats;
        (self.chi_square, self.shared_variance) = chi_stats;
        self.standard_deviation = if self.numeric {
            self.standard_deviation_of_values()
        } else {
            0.0
        };
    }

    /// Returns `(entropy, split_info, info_gain, gain_ratio)`.
    fn entropy_statistics(
        target_entropy: f64,
        rows: &[(u64, &ClassDistribution)],
    ) -> (f64, f64, f64, f64) {
        let total: u64 = rows.iter().map(|(f, _)| f).sum();
        if total == 0 {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let n = total as f64;
        let mut split_info = 0.0;
        let mut conditional = 0.0;
        for (freq, dist) in rows {
            if *freq == 0 {
                continue;
            }
            let p = *freq as f64 / n;
            split_info -= p * p.log2();
            conditional += p * dist.entropy();
        }
        let info_gain = target_entropy - conditional;
        let gain_ratio = if split_info > 0.0 {
            info_gain / split_info
        } else {
            0.0
        };
        (split_info, split_info, info_gain, gain_ratio)
    }

    /// Returns `(chi_square, shared_variance)`.
    fn chi_square_statistics(
        targets: &Targets,
        rows: &[(u64, &ClassDistribution)],
    ) -> (f64, f64) {
        let n_rows = rows.len();
        let n_cols = targets.total_values();
        if n_rows == 0 || n_cols == 0 {
            return (0.0, 0.0);
        }
        let mut table = Array2::<f64>::zeros((n_rows, n_cols));
        for (i, (_, dist)) in rows.iter().enumerate() {
            for (target, freq, _) in dist.iter() {
                if target < n_cols {
                    table[[i, target]] = freq as f64;
                }
            }
        }
        let n_i_dot: Vec<f64> = table.rows().into_iter().map(|r| r.sum()).collect();
        let n_dot_j: Vec<f64> = table.columns().into_iter().map(|c| c.sum()).collect();
        let n: f64 = n_i_dot.iter().sum();
        if n <= 0.0 {
            return (0.0, 0.0);
        }
        let mut chi2 = 0.0;
        for i in 0..n_rows {
            for j in 0..n_cols {
                let expected = n_i_dot[i] * n_dot_j[j] / n;
                if expected > 0.0 {
                    let delta = table[[i, j]] - expected;
                    chi2 += delta * delta / expected;
                }
            }
        }
        let eff_rows = n_i_dot.iter().filter(|&&s| s > 0.0).count();
        let eff_cols = n_dot_j.iter().filter(|&&s| s > 0.0).count();
        let dof = eff_rows.min(eff_cols).saturating_sub(1);
        let shared_variance = if dof > 0 { chi2 / (n * dof as f64) } else { 0.0 };
        (chi2, shared_variance)
    }

    /// Frequency-weighted population standard deviation of numeric values.
    fn standard_deviation_of_values(&self) -> f64 {
        let total: u64 = self.iter_values().map(|fv| fv.frequency).sum();
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        let mut mean = 0.0;
        for fv in self.iter_values() {
            if let Some(v) = fv.numeric {
                mean += fv.frequency as f64 * v;
            }
        }
        mean /= n;
        let mut var = 0.0;
        for fv in self.iter_values() {
            if let Some(v) = fv.numeric {
                var += fv.frequency as f64 * (v - mean) * (v - mean);
            }
        }
        (var / n).sqrt()
    }

    /// Group numeric values into `bin_size` equal-width bins over the
    /// feature's range, merging the per-value target distributions.
    fn numeric_bins(&self, bin_size: usize) -> Vec<(u64, ClassDistribution)> {
        let bins = bin_size.max(1);
        let range = self.numeric_range();
        if range <= 0.0 {
            let mut merged = ClassDistribution::new();
            let mut freq = 0;
            for fv in self.iter_values() {
                merged.merge(&fv.target_dist);
                freq += fv.frequency;
            }
            return vec![(freq, merged)];
        }
        let width = range / bins as f64;
        let mut out = vec![(0u64, ClassDistribution::new()); bins];
        for fv in self.iter_values() {
            let Some(v) = fv.numeric else { continue };
            let bin = (((v - self.n_min) / width).floor() as usize).min(bins - 1);
            out[bin].0 += fv.frequency;
            out[bin].1.merge(&fv.target_dist);
        }
        out
    }

    // =========================================================================
    // Value-difference matrix
    // =========================================================================

    /// True when a matrix has been stored.
    pub fn matrix_present(&self) -> bool {
        self.matrix.is_some()
    }

    /// The stored matrix, if any.
    pub fn matrix(&self) -> Option<&SymmetricMatrix> {
        self.matrix.as_ref()
    }

    /// Precompute the pairwise distance matrix for a storable metric.
    ///
    /// Pairs where either value's frequency falls below the clip frequency
    /// are left at 0 and treated as unknown by the kernels.
    pub fn store_matrix(
        &mut self,
        metric: MetricKind,
        interner: &StringInterner,
    ) -> Result<(), FeatureError> {
        if !metric.is_storable() {
            return Err(FeatureError::NotStorable(metric));
        }
        if self.numeric {
            return Err(FeatureError::StorableOnNumeric(metric));
        }
        let n = self.values.len();
        let mut matrix = SymmetricMatrix::new(n);
        for i in 1..n {
            if self.values[i].frequency < self.matrix_clip_freq {
                continue;
            }
            for j in (i + 1)..n {
                if self.values[j].frequency < self.matrix_clip_freq {
                    continue;
                }
                let a = &self.values[i];
                let b = &self.values[j];
                let d = match metric {
                    MetricKind::ValueDiff => metric::value_diff(&a.target_dist, &b.target_dist),
                    MetricKind::Jeffrey => metric::jeffrey(&a.target_dist, &b.target_dist),
                    MetricKind::JensenShannon => {
                        metric::jensen_shannon(&a.target_dist, &b.target_dist)
                    }
                    MetricKind::Levenshtein => metric::levenshtein(
                        a.name(interner).unwrap_or(""),
                        b.name(interner).unwrap_or(""),
                    ),
                    MetricKind::Dice => metric::dice(
                        a.name(interner).unwrap_or(""),
                        b.name(interner).unwrap_or(""),
                    ),
                    _ => unreachable!("checked storable above"),
                };
                matrix.set(i, j, d);
            }
        }
        self.matrix = Some(matrix);
        Ok(())
    }

    /// Drop the stored matrix.
    pub fn clear_matrix(&mut self) {
        self.matrix = None;
    }

    /// Render the stored matrix in its persistent text form.
    pub fn print_matrix(&self) -> Result<String, FeatureError> {
        self.matrix
            .as_ref()
            .map(SymmetricMatrix::print)
            .ok_or(FeatureError::MatrixNotBuilt)
    }

    /// Restore a matrix from its persistent text form.
    pub fn fill_matrix(&mut self, text: &str) -> Result<(), FeatureError> {
        let matrix = SymmetricMatrix::fill(text).ok_or(FeatureError::MatrixShape {
            expected: self.values.len(),
            got: 0,
        })?;
        if matrix.size() != self.values.len() {
            return Err(FeatureError::MatrixShape {
                expected: self.values.len(),
                got: matrix.size(),
            });
        }
        self.matrix = Some(matrix);
        Ok(())
    }

    /// Restore a matrix from raw cells (used by model deserialization).
    pub fn set_matrix(&mut self, matrix: SymmetricMatrix) -> Result<(), FeatureError> {
        if matrix.size() != self.values.len() {
            return Err(FeatureError::MatrixShape {
                expected: self.values.len(),
                got: matrix.size(),
            });
        }
        self.matrix = Some(matrix);
        Ok(())
    }

    // =========================================================================
    // Per-feature distance
    // =========================================================================

    /// Distance between two stored values under `metric`.
    ///
    /// The `threshold` gates prestored matrix use: a pair only reads the
    /// matrix when at least one of the two frequencies exceeds it (and both
    /// clear the clip frequency); below that the distance falls back to
    /// overlap. A storable metric whose matrix was never built is a state
    /// error.
    pub fn fv_distance(
        &self,
        a_idx: usize,
        b_idx: usize,
        metric: MetricKind,
        threshold: u64,
    ) -> Result<f64, FeatureError> {
        let a = self.values.get(a_idx);
        let b = self.values.get(b_idx);
        let (Some(a), Some(b)) = (a, b) else {
            return Ok(1.0);
        };
        if a.is_unknown() || b.is_unknown() {
            return Ok(1.0);
        }
        if self.numeric {
            return Ok(match (a.numeric, b.numeric) {
                (Some(x), Some(y)) => {
                    let range = self.numeric_range();
                    if range > 0.0 {
                        (x - y).abs() / range
                    } else {
                        0.0
                    }
                }
                _ => 1.0,
            });
        }
        if metric.is_storable() {
            let matrix = self.matrix.as_ref().ok_or(FeatureError::MatrixNotBuilt)?;
            if a.frequency >= self.matrix_clip_freq
                && b.frequency >= self.matrix_clip_freq
                && (a.frequency > threshold || b.frequency > threshold)
            {
                return Ok(matrix.get(a.index, b.index));
            }
        }
        Ok(if a.index == b.index { 0.0 } else { 1.0 })
    }

    /// Rebuild a value table entry from persisted parts (deserialization).
    pub fn restore_value(
        &mut self,
        name_id: usize,
        frequency: u64,
        numeric: Option<f64>,
        target_dist: ClassDistribution,
    ) -> usize {
        let idx = self.values.len();
        self.values.push(FeatureValue {
            name_id,
            index: idx,
            frequency,
            numeric,
            target_dist,
        });
        self.by_name.insert(name_id, idx);
        idx
    }

    /// Restore the scalar statistics block (deserialization).
    #[allow(clippy::too_many_arguments)]
    pub fn restore_stats(
        &mut self,
        entropy: f64,
        info_gain: f64,
        split_info: f64,
        gain_ratio: f64,
        chi_square: f64,
        shared_variance: f64,
        standard_deviation: f64,
    ) {
        self.entropy = entropy;
        self.info_gain = info_gain;
        self.split_info = split_info;
        self.gain_ratio = gain_ratio;
        self.chi_square = chi_square;
        self.shared_variance = shared_variance;
        self.standard_deviation = standard_deviation;
    }
}
