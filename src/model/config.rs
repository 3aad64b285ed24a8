//! Model configuration.
//!
//! [`MblConfig`] is the typed configuration for training and classification,
//! built through a validating builder. [`OptionTable`] wraps a config with
//! the two-phase option lifecycle: every option is settable from text while
//! the table is in its runtime state; once the model trains, the table
//! freezes and training-bound options reject mutation with
//! [`SetStatus::Frozen`] while query-time knobs stay live.
//!
//! # Example
//!
//! ```
//! use mblearn::model::MblConfig;
//! use mblearn::search::Decay;
//!
//! let config = MblConfig::builder()
//!     .num_neighbors(3)
//!     .decay(Decay::InvDist)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.num_neighbors, 3);
//! ```

use std::fmt::Write as _;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::logger::Verbosity;
use crate::metric::MetricKind;
use crate::search::decay::Decay;

// =============================================================================
// WeightKind / Normalization
// =============================================================================

/// Which statistic fills the per-feature search weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightKind {
    /// Every feature weighs 1.
    NoWeight,
    /// Gain ratio (the default).
    #[default]
    GainRatio,
    /// Information gain.
    InfoGain,
    /// Chi-squared.
    ChiSquare,
    /// Shared variance.
    SharedVariance,
    /// Standard deviation (numeric features).
    StandardDeviation,
    /// Caller-supplied weights.
    User,
}

impl WeightKind {
    /// Canonical option-table name.
    pub fn as_str(self) -> &'static str {
        match self {
            WeightKind::NoWeight => "no_weight",
            WeightKind::GainRatio => "gain_ratio",
            WeightKind::InfoGain => "info_gain",
            WeightKind::ChiSquare => "chi_square",
            WeightKind::SharedVariance => "shared_variance",
            WeightKind::StandardDeviation => "standard_deviation",
            WeightKind::User => "user",
        }
    }
}

impl std::fmt::Display for WeightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WeightKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_weight" | "nw" => Ok(WeightKind::NoWeight),
            "gain_ratio" | "gr" => Ok(WeightKind::GainRatio),
            "info_gain" | "ig" => Ok(WeightKind::InfoGain),
            "chi_square" | "x2" => Ok(WeightKind::ChiSquare),
            "shared_variance" | "sv" => Ok(WeightKind::SharedVariance),
            "standard_deviation" | "sd" => Ok(WeightKind::StandardDeviation),
            "user" => Ok(WeightKind::User),
            _ => Err(()),
        }
    }
}

/// Post-processing of the final vote distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Normalization {
    /// Leave raw vote weights.
    #[default]
    None,
    /// Scale weights to probabilities (sum 1).
    Probability,
    /// Smoothed probabilities: mix with a uniform floor at this rate.
    AddFactor(f64),
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Normalization::None => f.write_str("none"),
            Normalization::Probability => f.write_str("probability"),
            Normalization::AddFactor(v) => write!(f, "add_factor({v})"),
        }
    }
}

impl std::str::FromStr for Normalization {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Normalization::None),
            "probability" | "prob" => Ok(Normalization::Probability),
            "add1" => Ok(Normalization::AddFactor(1.0)),
            other => other
                .parse::<f64>()
                .map(Normalization::AddFactor)
                .map_err(|_| ()),
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `num_neighbors` must be at least 1.
    #[error("num_neighbors must be at least 1")]
    InvalidNeighbors,

    /// `max_bests` must be at least 1.
    #[error("max_bests must be at least 1")]
    InvalidMaxBests,

    /// `bin_size` must be at least 2.
    #[error("bin_size must be at least 2, got {0}")]
    InvalidBinSize(usize),

    /// Exponential decay alpha must be positive.
    #[error("decay alpha must be positive, got {0}")]
    InvalidDecayAlpha(f64),

    /// Exponential decay beta must be positive.
    #[error("decay beta must be positive, got {0}")]
    InvalidDecayBeta(f64),

    /// Dot-product distances are negative, so inverse-distance decay is
    /// undefined for them.
    #[error("inv_dist decay cannot combine with the dot_product metric")]
    InvDistWithDotProduct,

    /// Smoothing factor out of range.
    #[error("normalization factor must be in [0, 1], got {0}")]
    InvalidNormFactor(f64),

    /// Per-feature overrides make no sense under a whole-instance metric.
    #[error("per-feature metric overrides cannot combine with global similarity metric {0}")]
    OverridesWithSimilarity(MetricKind),

    /// A feature index in the config exceeds the dataset arity.
    #[error("feature index {0} out of range")]
    FeatureIndexOutOfRange(usize),

    /// Storable metrics are defined over symbolic values only.
    #[error("storable metric {metric} cannot apply to numeric feature {feature}")]
    StorableOnNumericFeature { feature: usize, metric: MetricKind },

    /// User weighting without user weights.
    #[error("weighting is set to user but no user weights were supplied")]
    MissingUserWeights,

    /// User weights with the wrong arity.
    #[error("user weights length {got} does not match feature count {expected}")]
    UserWeightsLength { expected: usize, got: usize },
}

// =============================================================================
// MblConfig
// =============================================================================

/// Configuration for training and classification.
///
/// Build with [`MblConfig::builder`]; `build()` validates and fails on
/// inconsistent settings.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct MblConfig {
    // === Distance ===
    /// Global distance metric. Default: overlap.
    #[builder(default)]
    pub metric: MetricKind,

    /// Per-feature metric overrides as `(feature index, metric)` pairs.
    #[builder(default)]
    pub feature_metrics: Vec<(usize, MetricKind)>,

    /// Features excluded from distance computation.
    #[builder(default)]
    pub ignored_features: Vec<usize>,

    // === Weighting ===
    /// Statistic used as the per-feature weight. Default: gain ratio.
    #[builder(default)]
    pub weighting: WeightKind,

    /// Weights for [`WeightKind::User`], one per feature.
    pub user_weights: Option<Vec<f64>>,

    // === Voting ===
    /// Number of nearest-distance buckets. Default: 1.
    #[builder(default = 1)]
    pub num_neighbors: usize,

    /// Cap on retained neighbor labels per bucket. Default: 500.
    #[builder(default = 500)]
    pub max_bests: usize,

    /// Distance decay for voting. Default: none.
    #[builder(default)]
    pub decay: Decay,

    /// Post-processing of the vote distribution. Default: none.
    #[builder(default)]
    pub normalization: Normalization,

    // === Training knobs ===
    /// Number of equal-width bins for numeric feature statistics.
    /// Default: 20.
    #[builder(default = 20)]
    pub bin_size: usize,

    /// Values below this frequency stay out of prestored matrices.
    /// Default: 10.
    #[builder(default = 10)]
    pub matrix_clip_freq: u64,

    /// A value pair reads a prestored matrix only when at least one
    /// frequency exceeds this threshold. Default: 1.
    #[builder(default = 1)]
    pub vd_threshold: u64,

    // === Reporting ===
    /// Retain neighbor labels and return a neighbor set per query.
    #[builder(default = false)]
    pub store_neighbors: bool,

    /// Include distances in neighbor reports.
    #[builder(default = false)]
    pub show_distance: bool,

    /// Include distributions in neighbor reports.
    #[builder(default = false)]
    pub show_distribution: bool,

    // === Resources ===
    /// Threads for batch classification: 0 = auto, 1 = sequential.
    #[builder(default = 0)]
    pub n_threads: usize,

    /// Training log verbosity. Default: silent.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: mbl_config_builder::IsComplete> MblConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<MblConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl MblConfig {
    /// Validate the configuration (arity-independent checks).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_neighbors < 1 {
            return Err(ConfigError::InvalidNeighbors);
        }
        if self.max_bests < 1 {
            return Err(ConfigError::InvalidMaxBests);
        }
        if self.bin_size < 2 {
            return Err(ConfigError::InvalidBinSize(self.bin_size));
        }
        if let Decay::ExpDecay { alpha, beta } = self.decay {
            if alpha <= 0.0 {
                return Err(ConfigError::InvalidDecayAlpha(alpha));
            }
            if beta <= 0.0 {
                return Err(ConfigError::InvalidDecayBeta(beta));
            }
        }
        if self.decay == Decay::InvDist && self.metric == MetricKind::DotProduct {
            return Err(ConfigError::InvDistWithDotProduct);
        }
        if let Normalization::AddFactor(factor) = self.normalization {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::InvalidNormFactor(factor));
            }
        }
        if self.metric.is_similarity()
            && self
                .feature_metrics
                .iter()
                .any(|&(_, m)| m != MetricKind::Numeric)
        {
            // Numeric overrides only declare a feature numeric; any other
            // per-feature kernel contradicts a whole-instance metric.
            return Err(ConfigError::OverridesWithSimilarity(self.metric));
        }
        if self.weighting == WeightKind::User && self.user_weights.is_none() {
            return Err(ConfigError::MissingUserWeights);
        }
        Ok(())
    }

    /// Validate the parts that depend on the dataset arity.
    pub fn validate_for_arity(&self, n_features: usize) -> Result<(), ConfigError> {
        for &(idx, _) in &self.feature_metrics {
            if idx >= n_features {
                return Err(ConfigError::FeatureIndexOutOfRange(idx));
            }
        }
        for &idx in &self.ignored_features {
            if idx >= n_features {
                return Err(ConfigError::FeatureIndexOutOfRange(idx));
            }
        }
        if self.weighting == WeightKind::User {
            let weights = self
                .user_weights
                .as_ref()
                .ok_or(ConfigError::MissingUserWeights)?;
            if weights.len() != n_features {
                return Err(ConfigError::UserWeightsLength {
                    expected: n_features,
                    got: weights.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for MblConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// OptionTable
// =============================================================================

/// Result of a textual option mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    /// The option was set.
    Ok,
    /// The option is training-bound and the table is frozen.
    Frozen,
    /// No option with that name exists.
    Unknown,
    /// The value did not parse or violated validation.
    IllegalValue,
}

/// Options that can no longer change once the model is trained.
const TRAINING_BOUND: &[&str] = &["metric", "weighting", "bin_size", "matrix_clip_freq"];

/// Textual option surface over [`MblConfig`] with freeze semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionTable {
    config: MblConfig,
    frozen: bool,
}

impl OptionTable {
    /// Wrap a config in its runtime (mutable) state.
    pub fn new(config: MblConfig) -> Self {
        Self {
            config,
            frozen: false,
        }
    }

    /// Wrap a config already frozen (model deserialization).
    pub fn frozen(config: MblConfig) -> Self {
        Self {
            config,
            frozen: true,
        }
    }

    /// The wrapped config.
    pub fn config(&self) -> &MblConfig {
        &self.config
    }

    /// True once [`freeze`](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Lock training-bound options.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Set one option from text.
    pub fn set(&mut self, name: &str, value: &str) -> SetStatus {
        if self.frozen && TRAINING_BOUND.contains(&name) {
            return SetStatus::Frozen;
        }
        let mut next = self.config.clone();
        let parsed = match name {
            "metric" => value
                .parse::<MetricKind>()
                .map(|v| next.metric = v)
                .is_ok(),
            "weighting" => value
                .parse::<WeightKind>()
                .map(|v| next.weighting = v)
                .is_ok(),
            "bin_size" => value.parse().map(|v| next.bin_size = v).is_ok(),
            "matrix_clip_freq" => value.parse().map(|v| next.matrix_clip_freq = v).is_ok(),
            "k" | "num_neighbors" => value.parse().map(|v| next.num_neighbors = v).is_ok(),
            "max_bests" => value.parse().map(|v| next.max_bests = v).is_ok(),
            "decay" => value.parse::<Decay>().map(|v| next.decay = v).is_ok(),
            "decay_alpha" => match (next.decay, value.parse::<f64>()) {
                (Decay::ExpDecay { beta, .. }, Ok(alpha)) => {
                    next.decay = Decay::ExpDecay { alpha, beta };
                    true
                }
                _ => false,
            },
            "decay_beta" => match (next.decay, value.parse::<f64>()) {
                (Decay::ExpDecay { alpha, .. }, Ok(beta)) => {
                    next.decay = Decay::ExpDecay { alpha, beta };
                    true
                }
                _ => false,
            },
            "normalization" => value
                .parse::<Normalization>()
                .map(|v| next.normalization = v)
                .is_ok(),
            "vd_threshold" => value.parse().map(|v| next.vd_threshold = v).is_ok(),
            "store_neighbors" => value.parse().map(|v| next.store_neighbors = v).is_ok(),
            "show_distance" => value.parse().map(|v| next.show_distance = v).is_ok(),
            "show_distribution" => value.parse().map(|v| next.show_distribution = v).is_ok(),
            "n_threads" => value.parse().map(|v| next.n_threads = v).is_ok(),
            "verbosity" => value
                .parse::<Verbosity>()
                .map(|v| next.verbosity = v)
                .is_ok(),
            _ => return SetStatus::Unknown,
        };
        if !parsed || next.validate().is_err() {
            return SetStatus::IllegalValue;
        }
        self.config = next;
        SetStatus::Ok
    }

    /// Render all options, one `name : value` line each.
    pub fn show(&self) -> String {
        let c = &self.config;
        let mut out = String::new();
        let mut line = |name: &str, value: String| {
            let _ = writeln!(out, "{name:<20}: {value}");
        };
        line("metric", c.metric.to_string());
        line("weighting", c.weighting.to_string());
        line("num_neighbors", c.num_neighbors.to_string());
        line("max_bests", c.max_bests.to_string());
        line("decay", c.decay.to_string());
        line("normalization", c.normalization.to_string());
        line("bin_size", c.bin_size.to_string());
        line("matrix_clip_freq", c.matrix_clip_freq.to_string());
        line("vd_threshold", c.vd_threshold.to_string());
        line("store_neighbors", c.store_neighbors.to_string());
        line("show_distance", c.show_distance.to_string());
        line("show_distribution", c.show_distribution.to_string());
        line("n_threads", c.n_threads.to_string());
        line("verbosity", c.verbosity.to_string());
        out
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MblConfig::default();
        assert_eq!(config.num_neighbors, 1);
        assert_eq!(config.metric, MetricKind::Overlap);
        assert_eq!(config.weighting, WeightKind::GainRatio);
    }

    #[test]
    fn zero_neighbors_is_rejected() {
        let result = MblConfig::builder().num_neighbors(0).build();
        assert_eq!(result.unwrap_err(), ConfigError::InvalidNeighbors);
    }

    #[test]
    fn bad_decay_beta_is_rejected() {
        let result = MblConfig::builder()
            .decay(Decay::ExpDecay {
                alpha: 1.0,
                beta: 0.0,
            })
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::InvalidDecayBeta(0.0));
    }

    #[test]
    fn inv_dist_with_dot_product_is_rejected() {
        let result = MblConfig::builder()
            .metric(MetricKind::DotProduct)
            .decay(Decay::InvDist)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::InvDistWithDotProduct);
    }

    #[test]
    fn similarity_with_overrides_is_rejected() {
        let result = MblConfig::builder()
            .metric(MetricKind::Cosine)
            .feature_metrics(vec![(0, MetricKind::Overlap)])
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::OverridesWithSimilarity(MetricKind::Cosine)
        );
        // Numeric declarations are fine under a similarity metric.
        let result = MblConfig::builder()
            .metric(MetricKind::Cosine)
            .feature_metrics(vec![(0, MetricKind::Numeric)])
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn user_weighting_requires_weights() {
        let result = MblConfig::builder().weighting(WeightKind::User).build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingUserWeights);
        let result = MblConfig::builder()
            .weighting(WeightKind::User)
            .user_weights(vec![1.0, 2.0])
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn arity_validation_catches_out_of_range_indices() {
        let config = MblConfig::builder()
            .feature_metrics(vec![(5, MetricKind::ValueDiff)])
            .build()
            .unwrap();
        assert_eq!(
            config.validate_for_arity(3).unwrap_err(),
            ConfigError::FeatureIndexOutOfRange(5)
        );
    }

    #[test]
    fn arity_validation_checks_user_weight_length() {
        let config = MblConfig::builder()
            .weighting(WeightKind::User)
            .user_weights(vec![1.0, 2.0])
            .build()
            .unwrap();
        assert_eq!(
            config.validate_for_arity(3).unwrap_err(),
            ConfigError::UserWeightsLength {
                expected: 3,
                got: 2
            }
        );
        assert!(config.validate_for_arity(2).is_ok());
    }

    #[test]
    fn option_table_sets_and_validates() {
        let mut table = OptionTable::new(MblConfig::default());
        assert_eq!(table.set("k", "3"), SetStatus::Ok);
        assert_eq!(table.config().num_neighbors, 3);
        assert_eq!(table.set("k", "0"), SetStatus::IllegalValue);
        assert_eq!(table.set("k", "many"), SetStatus::IllegalValue);
        assert_eq!(table.set("no_such_option", "1"), SetStatus::Unknown);
    }

    #[test]
    fn frozen_table_rejects_training_bound_options() {
        let mut table = OptionTable::new(MblConfig::default());
        table.freeze();
        assert_eq!(table.set("metric", "value_diff"), SetStatus::Frozen);
        assert_eq!(table.set("weighting", "info_gain"), SetStatus::Frozen);
        // Query-time knobs stay live after the freeze.
        assert_eq!(table.set("k", "5"), SetStatus::Ok);
        assert_eq!(table.set("decay", "inv_linear"), SetStatus::Ok);
    }

    #[test]
    fn decay_params_require_exp_decay() {
        let mut table = OptionTable::new(MblConfig::default());
        assert_eq!(table.set("decay_alpha", "2.0"), SetStatus::IllegalValue);
        assert_eq!(table.set("decay", "exp_decay"), SetStatus::Ok);
        assert_eq!(table.set("decay_alpha", "2.0"), SetStatus::Ok);
        assert_eq!(table.set("decay_beta", "0.5"), SetStatus::Ok);
        assert_eq!(
            table.config().decay,
            Decay::ExpDecay {
                alpha: 2.0,
                beta: 0.5
            }
        );
    }

    #[test]
    fn show_lists_every_option() {
        let table = OptionTable::new(MblConfig::default());
        let shown = table.show();
        for name in [
            "metric",
            "weighting",
            "num_neighbors",
            "decay",
            "normalization",
            "verbosity",
        ] {
            assert!(shown.contains(name), "missing option {name}");
        }
    }
}
