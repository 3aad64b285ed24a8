//! Training logging.
//!
//! Thin verbosity gate over the `log` crate. Components hold a
//! [`TrainingLogger`] and emit through it; the host application decides
//! where records go by installing a `log` backend.

use serde::{Deserialize, Serialize};

/// How much training progress to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// No output.
    #[default]
    Silent,
    /// Warnings only.
    Warning,
    /// Progress summaries.
    Info,
    /// Per-feature detail.
    Debug,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verbosity::Silent => "silent",
            Verbosity::Warning => "warning",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Verbosity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(Verbosity::Silent),
            "warning" => Ok(Verbosity::Warning),
            "info" => Ok(Verbosity::Info),
            "debug" => Ok(Verbosity::Debug),
            _ => Err(()),
        }
    }
}

/// Verbosity-gated logger used by the training pipeline.
#[derive(Debug, Clone, Copy)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    /// Create a logger at the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// The configured verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Emit a warning.
    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.verbosity >= Verbosity::Warning {
            log::warn!("{}", msg.as_ref());
        }
    }

    /// Emit a progress summary.
    pub fn info(&self, msg: impl AsRef<str>) {
        if self.verbosity >= Verbosity::Info {
            log::info!("{}", msg.as_ref());
        }
    }

    /// Emit per-feature detail.
    pub fn debug(&self, msg: impl AsRef<str>) {
        if self.verbosity >= Verbosity::Debug {
            log::debug!("{}", msg.as_ref());
        }
    }
}
