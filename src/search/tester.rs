//! Query-time distance aggregation.
//!
//! A tester binds a resolved query and walks candidates feature by feature
//! in the weight permutation (descending weight), so that the running
//! weighted sum grows as fast as possible and early termination can prune
//! candidates against the k-best rejection threshold after as few features
//! as possible.
//!
//! Distance metrics use [`DistanceTester`]; the whole-instance similarity
//! metrics use [`CosineTester`] and [`DotProductTester`], which map their
//! similarity onto a smaller-is-better distance scale (`1 - cos`, `-dot`).

use crate::data::features::FeatureSet;
use crate::metric::{FeatureKernel, MetricKind, QueryValue};

/// Tester construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TesterError {
    /// Similarity metrics apply to the whole instance, not to single
    /// features.
    #[error("similarity metric {0} cannot be a per-feature metric")]
    SimilarityPerFeature(MetricKind),
}

/// Aggregates per-feature distances between the bound query and candidates.
pub trait Tester<'m> {
    /// Bind a query (in original feature order) and the window of permuted
    /// features to examine: positions `offset..size`.
    fn init(&mut self, query: &[QueryValue<'m>], size: usize, offset: usize);

    /// Measure a candidate (dense value ids in original feature order).
    /// Returns the number of permuted features actually examined; a full
    /// pass returns the window size. Distance testers stop early once the
    /// running sum exceeds `threshold`.
    fn test(&mut self, candidate: &[u32], threshold: f64) -> usize;

    /// The aggregated distance after examining `prefix` features.
    fn distance(&self, prefix: usize) -> f64;

    /// Number of permuted features in the window.
    fn window(&self) -> usize;
}

/// Weighted sum of per-feature metric kernels, with early termination.
#[derive(Debug)]
pub struct DistanceTester<'m> {
    features: &'m FeatureSet,
    kernels: Vec<FeatureKernel>,
    query: Vec<QueryValue<'m>>,
    distances: Vec<f64>,
    offset: usize,
    size: usize,
}

impl<'m> DistanceTester<'m> {
    /// Build kernels for every permuted feature from its effective metric.
    pub fn new(
        features: &'m FeatureSet,
        global: MetricKind,
        vd_threshold: u64,
    ) -> Result<Self, TesterError> {
        let mut kernels = Vec::with_capacity(features.permutation().len());
        for &fi in features.permutation() {
            let metric = features[fi].effective_metric(global);
            let kernel = FeatureKernel::for_metric(metric, vd_threshold)
                .ok_or(TesterError::SimilarityPerFeature(metric))?;
            kernels.push(kernel);
        }
        let n = kernels.len();
        Ok(Self {
            features,
            kernels,
            query: Vec::new(),
            distances: vec![0.0; n + 1],
            offset: 0,
            size: n,
        })
    }
}

impl<'m> Tester<'m> for DistanceTester<'m> {
    fn init(&mut self, query: &[QueryValue<'m>], size: usize, offset: usize) {
        let perm = self.features.permutation();
        self.query = perm.iter().map(|&fi| query[fi]).collect();
        self.size = size.min(perm.len());
        self.offset = offset.min(self.size);
        self.distances.fill(0.0);
    }

    fn test(&mut self, candidate: &[u32], threshold: f64) -> usize {
        let perm = self.features.permutation();
        for i in self.offset..self.size {
            let fi = perm[i];
            let feat = &self.features[fi];
            let c = feat
                .value(candidate[fi] as usize)
                .unwrap_or_else(|| feat.unknown_value());
            let d = self.kernels[i].test(self.query[i], c, feat);
            self.distances[i + 1] = self.distances[i] + feat.weight() * d;
            if self.distances[i + 1] > threshold {
                return i + 1;
            }
        }
        self.size
    }

    fn distance(&self, prefix: usize) -> f64 {
        self.distances[prefix]
    }

    fn window(&self) -> usize {
        self.size
    }
}

/// Numeric interpretation of a query/candidate pair on one feature.
///
/// Symbolic values count as unit-magnitude dimensions that only correlate
/// when identical; numeric values use their actual magnitudes.
#[inline]
fn similarity_terms(
    query: QueryValue<'_>,
    candidate: &crate::data::feature::FeatureValue,
) -> (f64, f64, f64) {
    match query {
        QueryValue::Numeric(x) => match candidate.numeric() {
            Some(y) if !candidate.is_unknown() => (x * y, x * x, y * y),
            _ => (0.0, x * x, 0.0),
        },
        QueryValue::Value(q) => {
            if let (Some(x), Some(y)) = (q.numeric(), candidate.numeric()) {
                (x * y, x * x, y * y)
            } else {
                let xy = if !q.is_unknown()
                    && !candidate.is_unknown()
                    && q.index() == candidate.index()
                {
                    1.0
                } else {
                    0.0
                };
                (xy, 1.0, 1.0)
            }
        }
        QueryValue::Unknown => (0.0, 1.0, 1.0),
    }
}

/// Shared state of the two similarity testers.
struct SimilarityState<'m> {
    features: &'m FeatureSet,
    query: Vec<QueryValue<'m>>,
    offset: usize,
    size: usize,
    result: f64,
}

impl<'m> SimilarityState<'m> {
    fn new(features: &'m FeatureSet) -> Self {
        let n = features.permutation().len();
        Self {
            features,
            query: Vec::new(),
            offset: 0,
            size: n,
            result: 0.0,
        }
    }

    fn init(&mut self, query: &[QueryValue<'m>], size: usize, offset: usize) {
        let perm = self.features.permutation();
        self.query = perm.iter().map(|&fi| query[fi]).collect();
        self.size = size.min(perm.len());
        self.offset = offset.min(self.size);
        self.result = 0.0;
    }

    /// Accumulate `(sum wxy, sum wx^2, sum wy^2)` over the window.
    fn accumulate(&self, candidate: &[u32]) -> (f64, f64, f64) {
        let perm = self.features.permutation();
        let mut sum_xy = 0.0;
        let mut sum_x2 = 0.0;
        let mut sum_y2 = 0.0;
        for i in self.offset..self.size {
            let fi = perm[i];
            let feat = &self.features[fi];
            let c = feat
                .value(candidate[fi] as usize)
                .unwrap_or_else(|| feat.unknown_value());
            let (xy, x2, y2) = similarity_terms(self.query[i], c);
            let w = feat.weight();
            sum_xy += w * xy;
            sum_x2 += w * x2;
            sum_y2 += w * y2;
        }
        (sum_xy, sum_x2, sum_y2)
    }
}

/// Weighted cosine similarity, reported as the distance `1 - cos`.
pub struct CosineTester<'m> {
    state: SimilarityState<'m>,
}

impl<'m> CosineTester<'m> {
    /// Create a tester over the feature permutation.
    pub fn new(features: &'m FeatureSet) -> Self {
        Self {
            state: SimilarityState::new(features),
        }
    }
}

impl<'m> Tester<'m> for CosineTester<'m> {
    fn init(&mut self, query: &[QueryValue<'m>], size: usize, offset: usize) {
        self.state.init(query, size, offset);
    }

    fn test(&mut self, candidate: &[u32], _threshold: f64) -> usize {
        let (sum_xy, sum_x2, sum_y2) = self.state.accumulate(candidate);
        let denom = (sum_x2 * sum_y2).sqrt();
        let sim = if denom > 0.0 { sum_xy / denom } else { 0.0 };
        self.state.result = 1.0 - sim.clamp(-1.0, 1.0);
        self.state.size
    }

    fn distance(&self, _prefix: usize) -> f64 {
        self.state.result
    }

    fn window(&self) -> usize {
        self.state.size
    }
}

/// Weighted dot product, reported as the distance `-dot`.
pub struct DotProductTester<'m> {
    state: SimilarityState<'m>,
}

impl<'m> DotProductTester<'m> {
    /// Create a tester over the feature permutation.
    pub fn new(features: &'m FeatureSet) -> Self {
        Self {
            state: SimilarityState::new(features),
        }
    }
}

impl<'m> Tester<'m> for DotProductTester<'m> {
    fn init(&mut self, query: &[QueryValue<'m>], size: usize, offset: usize) {
        self.state.init(query, size, offset);
    }

    fn test(&mut self, candidate: &[u32], _threshold: f64) -> usize {
        let (sum_xy, _, _) = self.state.accumulate(candidate);
        self.state.result = -sum_xy;
        self.state.size
    }

    fn distance(&self, _prefix: usize) -> f64 {
        self.state.result
    }

    fn window(&self) -> usize {
        self.state.size
    }
}

/// Pick the tester implied by the global metric.
pub fn tester_for<'m>(
    global: MetricKind,
    features: &'m FeatureSet,
    vd_threshold: u64,
) -> Result<Box<dyn Tester<'m> + 'm>, TesterError> {
    match global {
        MetricKind::Cosine => Ok(Box::new(CosineTester::new(features))),
        MetricKind::DotProduct => Ok(Box::new(DotProductTester::new(features))),
        _ => Ok(Box::new(DistanceTester::new(
            features,
            global,
            vd_threshold,
        )?)),
    }
}
