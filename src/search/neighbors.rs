//! Neighbor-set reporting.
//!
//! A [`NeighborSet`] is the query-side snapshot of the k-best buckets handed
//! to downstream reporters: per bucket the distance, the number of tied
//! neighbors merged into it, the aggregated distribution and (when neighbor
//! retention is on) the retained labels. The XML surface form is consumed by
//! external tooling.

use std::fmt::Write as _;

use crate::data::distribution::ClassDistribution;
use crate::data::targets::Targets;
use crate::interner::StringInterner;

/// One reported bucket.
#[derive(Debug, Clone)]
pub struct Neighbor {
    /// Distance shared by the bucket.
    pub distance: f64,
    /// Total number of tied neighbors merged into the bucket.
    pub total: u64,
    /// Aggregated class distribution.
    pub distribution: ClassDistribution,
    /// Retained neighbor labels (possibly capped below `total`).
    pub labels: Vec<String>,
    /// Distribution copies parallel to `labels`.
    pub label_dists: Vec<ClassDistribution>,
}

/// Ordered bucket report for one query.
#[derive(Debug, Clone)]
pub struct NeighborSet {
    entries: Vec<Neighbor>,
    max_bests: usize,
    store_instances: bool,
    show_distance: bool,
    show_distribution: bool,
}

impl NeighborSet {
    /// Create an empty set with the given reporting flags.
    pub fn new(
        max_bests: usize,
        store_instances: bool,
        show_distance: bool,
        show_distribution: bool,
    ) -> Self {
        Self {
            entries: Vec::new(),
            max_bests,
            store_instances,
            show_distance,
            show_distribution,
        }
    }

    /// Append a bucket.
    pub fn push(&mut self, neighbor: Neighbor) {
        self.entries.push(neighbor);
    }

    /// Number of reported buckets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bucket by rank.
    pub fn get(&self, j: usize) -> Option<&Neighbor> {
        self.entries.get(j)
    }

    /// Iterate buckets by ascending distance.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.iter()
    }

    /// Render the XML surface form.
    pub fn to_xml(&self, targets: &Targets, interner: &StringInterner) -> String {
        let mut out = String::from("<neighborset>");
        for (k, n) in self.entries.iter().enumerate() {
            if self.store_instances {
                if n.total == 0 {
                    break;
                }
                let _ = write!(
                    out,
                    "<neighbors k=\"{}\" total=\"{}\" distance=\"{}\"",
                    k + 1,
                    n.total,
                    n.distance
                );
                if (self.max_bests as u64) < n.total {
                    let _ = write!(out, " limited=\"{}\"", self.max_bests);
                }
                out.push('>');
                for (m, label) in n.labels.iter().enumerate() {
                    out.push_str("<neighbor><instance>");
                    out.push_str(label);
                    out.push_str("</instance>");
                    if self.show_distribution {
                        out.push_str("<distribution>");
                        out.push_str(&n.label_dists[m].to_display_string(targets, interner));
                        out.push_str("</distribution>");
                    }
                    out.push_str("</neighbor>");
                }
                out.push_str("</neighbors>");
            } else {
                if n.distribution.total_items() == 0 {
                    break;
                }
                let _ = write!(out, "<neighbors k=\"{}\">", k + 1);
                if self.show_distribution {
                    out.push_str("<distribution>");
                    out.push_str(&n.distribution.to_display_string(targets, interner));
                    out.push_str("</distribution>");
                }
                if self.show_distance {
                    let _ = write!(out, "<distance>{}</distance>", n.distance);
                }
                out.push_str("</neighbors>");
            }
        }
        out.push_str("</neighborset>");
        out
    }
}
