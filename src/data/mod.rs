//! The training-side data model.
//!
//! - [`Targets`]: the class-label arena with frequency bookkeeping
//! - [`ClassDistribution`]: multisets over targets with optional weights
//! - [`Feature`] / [`FeatureValue`]: per-column vocabularies, statistics and
//!   prestored distance matrices
//! - [`FeatureSet`]: the ordered columns plus the weight permutation
//! - [`Dataset`] / [`Sample`] / [`Instance`]: raw and resolved examples
//!
//! Everything here is mutated during training only; once a model is frozen
//! the whole data layer is read-only and safe to share across query threads.

pub mod distribution;
pub mod feature;
pub mod features;
pub mod instance;
pub mod matrix;
pub mod targets;

pub use distribution::{ClassDistribution, DistParseError, Vote, NORM_EPSILON};
pub use feature::{Feature, FeatureError, FeatureValue, NumericStatus};
pub use features::FeatureSet;
pub use instance::{Dataset, Instance, Sample, SchemaError};
pub use matrix::SymmetricMatrix;
pub use targets::{TargetValue, Targets};
