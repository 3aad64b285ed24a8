//! The model surface: configuration and the trained learner.

pub mod config;
pub mod learner;

pub use config::{ConfigError, MblConfig, Normalization, OptionTable, SetStatus, WeightKind};
pub use learner::{Classification, Exemplar, MblModel, TrainError};
