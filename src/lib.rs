//! mblearn: memory-based learning for Rust.
//!
//! A lazy-learning classifier: training stores labeled instances (with
//! frequency bookkeeping and information-theoretic feature statistics);
//! classification finds the k nearest neighbors of a query under
//! per-feature weighted distance metrics and votes their class
//! distributions, optionally decayed by distance.
//!
//! # Key Types
//!
//! - [`MblModel`] - the trained classifier with classify/evaluate
//! - [`MblConfig`] - configuration builder (metric, weighting, k, decay)
//! - [`Dataset`] / [`Sample`] - training and test data
//! - [`Classification`] - prediction with distribution and neighbor report
//!
//! # Training and classification
//!
//! ```
//! use mblearn::{Dataset, MblConfig, MblModel};
//!
//! let dataset = Dataset::from_rows([
//!     (["sunny", "hot"], "no"),
//!     (["sunny", "cool"], "yes"),
//!     (["rain", "cool"], "yes"),
//! ]).unwrap();
//!
//! let model = MblModel::train(MblConfig::default(), &dataset).unwrap();
//! let result = model.classify(&["sunny", "cool"]).unwrap();
//! assert_eq!(result.predicted, "yes");
//! ```

// Re-export approx traits for users who want to compare distributions
pub use approx;

pub mod data;
pub mod eval;
pub mod interner;
pub mod io;
pub mod logger;
pub mod metric;
pub mod model;
pub mod search;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// High-level model types
pub use model::{Classification, MblConfig, MblModel, TrainError};

// Configuration vocabulary
pub use model::{Normalization, OptionTable, SetStatus, WeightKind};

// Data types (for preparing training data)
pub use data::{ClassDistribution, Dataset, Sample, SchemaError, Targets};

// Metrics and voting
pub use metric::MetricKind;
pub use search::{Decay, NeighborSet};

// Evaluation
pub use eval::TestStatistics;

// Logging and parallelism
pub use logger::Verbosity;
pub use utils::{run_with_threads, Parallelism};
