//! Distance metrics.
//!
//! Every feature measures the distance between two of its values with a
//! metric kernel chosen from [`MetricKind`]. Symbolic metrics compare value
//! identities or the divergence between the values' conditional target
//! distributions; the numeric metric compares scaled magnitudes; cosine and
//! dot product are whole-instance similarity metrics handled by the
//! similarity testers rather than a per-feature kernel.
//!
//! Divergence-based metrics are *storable*: their pairwise distances are
//! precomputed into a [`SymmetricMatrix`](crate::data::SymmetricMatrix)
//! after training, and query-time kernels only index that matrix.

use serde::{Deserialize, Serialize};

use crate::data::distribution::ClassDistribution;
use crate::data::feature::{Feature, FeatureValue};

/// Distance metric selector, global or per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricKind {
    /// 0 when identical, 1 otherwise.
    #[default]
    Overlap,
    /// Modified value difference: L1 distance between the values'
    /// conditional target distributions.
    ValueDiff,
    /// Jeffrey (symmetrized Kullback-Leibler) divergence.
    Jeffrey,
    /// Jensen-Shannon divergence.
    JensenShannon,
    /// Edit distance between the value strings.
    Levenshtein,
    /// Bigram Dice distance between the value strings.
    Dice,
    /// Scaled absolute difference for numeric features.
    Numeric,
    /// Cosine similarity over the whole instance (global only).
    Cosine,
    /// Dot-product similarity over the whole instance (global only).
    DotProduct,
}

impl MetricKind {
    /// True for metrics whose pairwise distances are precomputed into a
    /// symmetric matrix after training.
    pub fn is_storable(self) -> bool {
        matches!(
            self,
            MetricKind::ValueDiff
                | MetricKind::Jeffrey
                | MetricKind::JensenShannon
                | MetricKind::Levenshtein
                | MetricKind::Dice
        )
    }

    /// True for whole-instance similarity metrics.
    pub fn is_similarity(self) -> bool {
        matches!(self, MetricKind::Cosine | MetricKind::DotProduct)
    }

    /// Canonical option-table name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Overlap => "overlap",
            MetricKind::ValueDiff => "value_diff",
            MetricKind::Jeffrey => "jeffrey",
            MetricKind::JensenShannon => "jensen_shannon",
            MetricKind::Levenshtein => "levenshtein",
            MetricKind::Dice => "dice",
            MetricKind::Numeric => "numeric",
            MetricKind::Cosine => "cosine",
            MetricKind::DotProduct => "dot_product",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overlap" => Ok(MetricKind::Overlap),
            "value_diff" | "vd" => Ok(MetricKind::ValueDiff),
            "jeffrey" => Ok(MetricKind::Jeffrey),
            "jensen_shannon" | "js" => Ok(MetricKind::JensenShannon),
            "levenshtein" => Ok(MetricKind::Levenshtein),
            "dice" => Ok(MetricKind::Dice),
            "numeric" => Ok(MetricKind::Numeric),
            "cosine" => Ok(MetricKind::Cosine),
            "dot_product" | "dot" => Ok(MetricKind::DotProduct),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Distribution divergences
// =============================================================================

fn prob(dist: &ClassDistribution, target: usize) -> f64 {
    let total = dist.total_items();
    if total == 0 {
        return 0.0;
    }
    dist.frequency(target) as f64 / total as f64
}

fn target_union(a: &ClassDistribution, b: &ClassDistribution) -> Vec<usize> {
    let mut targets: Vec<usize> = a.iter().map(|(t, _, _)| t).collect();
    for (t, _, _) in b.iter() {
        if !targets.contains(&t) {
            targets.push(t);
        }
    }
    targets
}

/// Modified value difference: `sum_t |p_a(t) - p_b(t)|`.
pub fn value_diff(a: &ClassDistribution, b: &ClassDistribution) -> f64 {
    target_union(a, b)
        .into_iter()
        .map(|t| (prob(a, t) - prob(b, t)).abs())
        .sum()
}

/// Jeffrey divergence: `sum_t p log2(p/m) + q log2(q/m)` with
/// `m = (p + q) / 2`. Zero-probability terms contribute nothing.
pub fn jeffrey(a: &ClassDistribution, b: &ClassDistribution) -> f64 {
    let mut sum = 0.0;
    for t in target_union(a, b) {
        let p = prob(a, t);
        let q = prob(b, t);
        let m = 0.5 * (p + q);
        if p > 0.0 {
            sum += p * (p / m).log2();
        }
        if q > 0.0 {
            sum += q * (q / m).log2();
        }
    }
    sum
}

/// Jensen-Shannon divergence: half the Jeffrey divergence, bounded to
/// `[0, 1]` in base 2.
pub fn jensen_shannon(a: &ClassDistribution, b: &ClassDistribution) -> f64 {
    0.5 * jeffrey(a, b)
}

// =============================================================================
// String distances (Levenshtein, Dice)
// =============================================================================

/// Levenshtein edit distance between two strings, over chars.
pub fn levenshtein(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len() as f64;
    }
    if b.is_empty() {
        return a.len() as f64;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()] as f64
}

/// Bigram Dice distance: `1 - 2 |A ∩ B| / (|A| + |B|)` over character
/// bigrams. Strings shorter than two chars compare by identity.
pub fn dice(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let mut a_grams = bigrams(a);
    let b_grams = bigrams(b);
    if a_grams.is_empty() || b_grams.is_empty() {
        return if a == b { 0.0 } else { 1.0 };
    }
    let total = a_grams.len() + b_grams.len();
    let mut common = 0usize;
    for g in &b_grams {
        if let Some(pos) = a_grams.iter().position(|x| x == g) {
            a_grams.swap_remove(pos);
            common += 1;
        }
    }
    1.0 - 2.0 * common as f64 / total as f64
}

// =============================================================================
// Query values and per-feature kernels
// =============================================================================

/// One resolved query value, bound against a frozen model.
///
/// Queries never mutate the model, so unseen symbols do not get interned;
/// they act as the unknown sentinel. Unseen numerics keep their parsed value
/// so the numeric metric still applies.
#[derive(Debug, Clone, Copy)]
pub enum QueryValue<'a> {
    /// A value present in the feature's training vocabulary.
    Value(&'a FeatureValue),
    /// A symbol never seen in training.
    Unknown,
    /// A numeric value (possibly unseen in training).
    Numeric(f64),
}

/// Per-feature distance kernel, instantiated from the feature's effective
/// metric. `test` never fails; states that would be errors at training time
/// (missing matrix) fall back to the overlap distance.
#[derive(Debug, Clone, Copy)]
pub enum FeatureKernel {
    /// Identity comparison.
    Overlap,
    /// Scaled absolute difference over the feature's numeric range.
    Numeric,
    /// Prestored divergence matrix lookup with overlap fallback below the
    /// frequency threshold.
    Prestored {
        /// A pair uses the matrix only when at least one of the two values
        /// has a frequency above this threshold.
        threshold: u64,
    },
}

impl FeatureKernel {
    /// Kernel for a per-feature metric. Similarity metrics have no
    /// per-feature kernel and return `None`.
    pub fn for_metric(metric: MetricKind, vd_threshold: u64) -> Option<Self> {
        match metric {
            MetricKind::Overlap => Some(FeatureKernel::Overlap),
            MetricKind::Numeric => Some(FeatureKernel::Numeric),
            m if m.is_storable() => Some(FeatureKernel::Prestored {
                threshold: vd_threshold,
            }),
            _ => None,
        }
    }

    /// Distance between a query value and a stored candidate value.
    #[inline]
    pub fn test(&self, query: QueryValue<'_>, candidate: &FeatureValue, feature: &Feature) -> f64 {
        match self {
            FeatureKernel::Overlap => overlap(query, candidate),
            FeatureKernel::Numeric => {
                let q = match query {
                    QueryValue::Numeric(v) => Some(v),
                    QueryValue::Value(fv) if !fv.is_unknown() => fv.numeric(),
                    _ => None,
                };
                let c = if candidate.is_unknown() {
                    None
                } else {
                    candidate.numeric()
                };
                match (q, c) {
                    (Some(q), Some(c)) => {
                        let range = feature.numeric_range();
                        if range > 0.0 {
                            (q - c).abs() / range
                        } else {
                            0.0
                        }
                    }
                    _ => 1.0,
                }
            }
            FeatureKernel::Prestored { threshold } => {
                let QueryValue::Value(q) = query else {
                    return 1.0;
                };
                if q.is_unknown() || candidate.is_unknown() {
                    return 1.0;
                }
                if let Some(matrix) = feature.matrix() {
                    let clip = feature.matrix_clip_freq();
                    if q.frequency() >= clip
                        && candidate.frequency() >= clip
                        && (q.frequency() > *threshold || candidate.frequency() > *threshold)
                    {
                        return matrix.get(q.index(), candidate.index());
                    }
                }
                if q.index() == candidate.index() {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

#[inline]
fn overlap(query: QueryValue<'_>, candidate: &FeatureValue) -> f64 {
    match query {
        QueryValue::Value(q) => {
            if !q.is_unknown() && !candidate.is_unknown() && q.index() == candidate.index() {
                0.0
            } else {
                1.0
            }
        }
        QueryValue::Numeric(v) => {
            if candidate.numeric() == Some(v) {
                0.0
            } else {
                1.0
            }
        }
        QueryValue::Unknown => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn dist(pairs: &[(usize, u64)]) -> ClassDistribution {
        let mut d = ClassDistribution::new();
        for &(t, f) in pairs {
            d.inc_freq(t, f);
        }
        d
    }

    #[test]
    fn value_diff_of_identical_distributions_is_zero() {
        let a = dist(&[(0, 2), (1, 2)]);
        assert_relative_eq!(value_diff(&a, &a), 0.0);
    }

    #[test]
    fn value_diff_of_disjoint_distributions_is_two() {
        let a = dist(&[(0, 3)]);
        let b = dist(&[(1, 5)]);
        assert_relative_eq!(value_diff(&a, &b), 2.0);
    }

    #[test]
    fn value_diff_is_symmetric() {
        let a = dist(&[(0, 1), (1, 3)]);
        let b = dist(&[(0, 2), (2, 2)]);
        assert_relative_eq!(value_diff(&a, &b), value_diff(&b, &a));
    }

    #[test]
    fn jeffrey_of_disjoint_distributions_is_two_bits() {
        let a = dist(&[(0, 1)]);
        let b = dist(&[(1, 1)]);
        assert_relative_eq!(jeffrey(&a, &b), 2.0);
        assert_relative_eq!(jensen_shannon(&a, &b), 1.0);
    }

    #[test]
    fn jeffrey_of_identical_distributions_is_zero() {
        let a = dist(&[(0, 2), (1, 6)]);
        assert_relative_eq!(jeffrey(&a, &a), 0.0);
    }

    #[rstest]
    #[case("kitten", "sitting", 3.0)]
    #[case("", "abc", 3.0)]
    #[case("same", "same", 0.0)]
    #[case("a", "b", 1.0)]
    fn levenshtein_cases(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert_relative_eq!(levenshtein(a, b), expected);
    }

    #[test]
    fn dice_of_identical_strings_is_zero() {
        assert_relative_eq!(dice("night", "night"), 0.0);
    }

    #[test]
    fn dice_of_disjoint_strings_is_one() {
        assert_relative_eq!(dice("abc", "xyz"), 1.0);
    }

    #[test]
    fn dice_short_strings_compare_by_identity() {
        assert_relative_eq!(dice("a", "a"), 0.0);
        assert_relative_eq!(dice("a", "b"), 1.0);
    }

    #[test]
    fn dice_partial_overlap() {
        // "night" bigrams: ni ig gh ht; "nacht": na ac ch ht -> 1 common.
        assert_relative_eq!(dice("night", "nacht"), 1.0 - 2.0 / 8.0);
    }

    #[test]
    fn storable_and_similarity_partitions() {
        assert!(MetricKind::ValueDiff.is_storable());
        assert!(MetricKind::Dice.is_storable());
        assert!(!MetricKind::Overlap.is_storable());
        assert!(MetricKind::Cosine.is_similarity());
        assert!(!MetricKind::Numeric.is_similarity());
    }

    #[test]
    fn metric_names_roundtrip() {
        for m in [
            MetricKind::Overlap,
            MetricKind::ValueDiff,
            MetricKind::Jeffrey,
            MetricKind::JensenShannon,
            MetricKind::Levenshtein,
            MetricKind::Dice,
            MetricKind::Numeric,
            MetricKind::Cosine,
            MetricKind::DotProduct,
        ] {
            assert_eq!(m.as_str().parse::<MetricKind>(), Ok(m));
        }
        assert!("no_such_metric".parse::<MetricKind>().is_err());
    }

    #[test]
    fn similarity_metrics_have_no_kernel() {
        assert!(FeatureKernel::for_metric(MetricKind::Cosine, 1).is_none());
        assert!(FeatureKernel::for_metric(MetricKind::Overlap, 1).is_some());
    }
}
