//! Payload structures for the model storage format.
//!
//! These structs mirror the runtime types but are shaped for serde. The
//! top-level payload is version-tagged: new format versions add variants
//! rather than modifying existing ones, so older readers can detect
//! unsupported versions by the enum discriminant.
//!
//! Class distributions embed in their text form — dense-index (`save`) or
//! interned-id (`save_hashed`) — selected by the `hashed` flag.

use serde::{Deserialize, Serialize};

use crate::metric::MetricKind;
use crate::model::config::MblConfig;

/// Version-tagged model payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelPayload {
    /// Version 1 payload format.
    V1(ModelPayloadV1),
}

/// Version 1 payload structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPayloadV1 {
    /// Frozen option snapshot.
    pub options: MblConfig,
    /// Whether distribution texts use interned ids instead of dense indices.
    pub hashed: bool,
    /// Interner contents in id order (id = position + 1).
    pub strings: Vec<String>,
    /// Targets in dense index order.
    pub targets: Vec<TargetPayload>,
    /// Features in column order.
    pub features: Vec<FeaturePayload>,
    /// The deduplicated exemplar store.
    pub exemplars: Vec<ExemplarPayload>,
    /// Entropy of the training target distribution.
    pub target_entropy: f64,
    /// Training instance count.
    pub n_instances: u64,
}

/// One target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPayload {
    /// Interned name id (0 for placeholders).
    pub name_id: usize,
    /// Training frequency.
    pub frequency: u64,
}

/// One feature column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePayload {
    /// Excluded from distance computation.
    pub ignore: bool,
    /// Values carry a numeric interpretation.
    pub numeric: bool,
    /// Per-feature metric override.
    pub metric_override: Option<MetricKind>,
    /// Search weight.
    pub weight: f64,
    /// Entropy of the value distribution.
    pub entropy: f64,
    /// Information gain.
    pub info_gain: f64,
    /// Split info.
    pub split_info: f64,
    /// Gain ratio.
    pub gain_ratio: f64,
    /// Chi-squared statistic.
    pub chi_square: f64,
    /// Shared variance.
    pub shared_variance: f64,
    /// Standard deviation (numeric features).
    pub standard_deviation: f64,
    /// Smallest numeric value.
    pub n_min: f64,
    /// Largest numeric value.
    pub n_max: f64,
    /// Matrix clip frequency.
    pub matrix_clip_freq: u64,
    /// Real values in dense index order (the unknown sentinel is implicit).
    pub values: Vec<ValuePayload>,
    /// Prestored distance matrix, when the metric is storable.
    pub matrix: Option<MatrixPayload>,
}

/// One feature value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuePayload {
    /// Interned name id.
    pub name_id: usize,
    /// Training frequency.
    pub frequency: u64,
    /// Numeric interpretation, if parsed.
    pub numeric: Option<f64>,
    /// Target distribution in text form.
    pub dist: String,
}

/// Upper-triangular matrix cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixPayload {
    /// Matrix dimension (value table length).
    pub size: usize,
    /// Strictly upper-triangular cells, row-major.
    pub cells: Vec<f64>,
}

/// One exemplar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemplarPayload {
    /// Dense value ids, one per feature.
    pub values: Vec<u32>,
    /// Aggregated class distribution in text form.
    pub dist: String,
}
