//! Query-time machinery.
//!
//! The classify pipeline for one query: a [`Tester`] aggregates per-feature
//! distances over the weight permutation, a [`BestArray`] accumulates the k
//! best buckets with tie merging, and a [`Decay`] turns the buckets into a
//! weighted vote. [`NeighborSet`] is the reporting snapshot of the buckets.
//!
//! All of this operates on a frozen, read-only model; one tester and one
//! accumulator per worker makes batch classification embarrassingly
//! parallel.

pub mod best;
pub mod decay;
pub mod neighbors;
pub mod tester;

pub use best::{BestArray, BestEntry, DISTANCE_EPSILON};
pub use decay::Decay;
pub use neighbors::{Neighbor, NeighborSet};
pub use tester::{tester_for, CosineTester, DistanceTester, DotProductTester, Tester, TesterError};
