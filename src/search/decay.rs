//! Neighbor decay schemes.
//!
//! A decay maps a neighbor bucket (its rank and distance) to a voting
//! weight. `Zero` is plain majority voting over the k buckets; the others
//! give closer neighbors more say.

use serde::{Deserialize, Serialize};

/// Distance decay applied during voting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Decay {
    /// No decay: every bucket votes with weight 1.
    #[default]
    Zero,
    /// Inverse distance: `1 / (d + eps)`.
    InvDist,
    /// Linear interpolation between the nearest and the furthest bucket.
    InvLinear,
    /// Exponential decay: `exp(-alpha * d^beta)`.
    ExpDecay {
        /// Scale of the exponent.
        alpha: f64,
        /// Power applied to the distance.
        beta: f64,
    },
}

impl Decay {
    /// Canonical option-table name.
    pub fn as_str(self) -> &'static str {
        match self {
            Decay::Zero => "zero",
            Decay::InvDist => "inv_dist",
            Decay::InvLinear => "inv_linear",
            Decay::ExpDecay { .. } => "exp_decay",
        }
    }
}

impl std::fmt::Display for Decay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decay::ExpDecay { alpha, beta } => {
                write!(f, "exp_decay(alpha={alpha}, beta={beta})")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

impl std::str::FromStr for Decay {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" => Ok(Decay::Zero),
            "inv_dist" | "id" => Ok(Decay::InvDist),
            "inv_linear" | "il" => Ok(Decay::InvLinear),
            "exp_decay" | "ed" => Ok(Decay::ExpDecay {
                alpha: 1.0,
                beta: 1.0,
            }),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        assert_eq!("zero".parse::<Decay>(), Ok(Decay::Zero));
        assert_eq!("inv_dist".parse::<Decay>(), Ok(Decay::InvDist));
        assert_eq!(
            "exp_decay".parse::<Decay>(),
            Ok(Decay::ExpDecay {
                alpha: 1.0,
                beta: 1.0
            })
        );
        assert!("nope".parse::<Decay>().is_err());
    }
}
