//! The bounded k-best accumulator.
//!
//! A [`BestArray`] keeps the `k` smallest distances seen so far, one bucket
//! per distinct distance. Candidates at (epsilon-)equal distance merge into
//! the same bucket: their class distributions add up, and optionally up to
//! `max_bests` neighbor labels are retained per bucket. The aggregated
//! distribution always reflects *all* merged candidates, even when label
//! retention is capped.
//!
//! `add_result` returns the updated rejection threshold (the current k-th
//! distance, or infinity while buckets remain empty) which callers feed back
//! into the tester's early termination.

use crate::data::distribution::ClassDistribution;
use crate::search::decay::Decay;
use crate::search::neighbors::{Neighbor, NeighborSet};

/// Tolerance under which two distances count as tied.
pub const DISTANCE_EPSILON: f64 = 1e-15;

/// One distance bucket.
#[derive(Debug, Clone, Default)]
pub struct BestEntry {
    distance: f64,
    occupied: bool,
    aggregate: ClassDistribution,
    labels: Vec<String>,
    label_dists: Vec<ClassDistribution>,
}

impl BestEntry {
    /// Distance shared by every candidate merged into this bucket.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// True once a candidate landed in this bucket.
    pub fn occupied(&self) -> bool {
        self.occupied
    }

    /// Aggregated class distribution of all merged candidates.
    pub fn aggregate(&self) -> &ClassDistribution {
        &self.aggregate
    }

    /// Retained neighbor labels (capped at `max_bests`).
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Per-label distribution copies, parallel to `labels`.
    pub fn label_dists(&self) -> &[ClassDistribution] {
        &self.label_dists
    }

    fn reset_to(&mut self, distance: f64, dist: &ClassDistribution, label: &str, store: bool) {
        self.distance = distance;
        self.occupied = true;
        self.aggregate.clear();
        self.aggregate.merge(dist);
        self.labels.clear();
        self.label_dists.clear();
        if store {
            self.labels.push(label.to_owned());
            self.label_dists.push(dist.clone());
        }
    }
}

/// Bounded k-best accumulator with tie merging.
#[derive(Debug, Clone, Default)]
pub struct BestArray {
    entries: Vec<BestEntry>,
    max_bests: usize,
    store_instances: bool,
    show_distance: bool,
    show_distribution: bool,
}

impl BestArray {
    /// Create an unconfigured accumulator; call [`init`](Self::init) before
    /// use.
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)configure for `k` buckets. Existing buckets are cleared; the
    /// allocation is reused across queries.
    pub fn init(
        &mut self,
        k: usize,
        max_bests: usize,
        store_instances: bool,
        show_distance: bool,
        show_distribution: bool,
    ) {
        self.max_bests = max_bests;
        self.store_instances = store_instances;
        self.show_distance = show_distance;
        self.show_distribution = show_distribution;
        self.entries.resize_with(k, BestEntry::default);
        for e in &mut self.entries {
            e.distance = 0.0;
            e.occupied = false;
            e.aggregate.clear();
            e.labels.clear();
            e.label_dists.clear();
        }
    }

    /// Number of buckets (k).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no buckets are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buckets holding at least one candidate.
    pub fn occupied_len(&self) -> usize {
        self.entries.iter().take_while(|e| e.occupied).count()
    }

    /// Bucket by rank.
    pub fn entry(&self, j: usize) -> Option<&BestEntry> {
        self.entries.get(j)
    }

    /// Offer a candidate. Ties merge, better distances insert, worse ones
    /// are silently ignored. Returns the new rejection threshold: the k-th
    /// bucket's distance, or infinity while any bucket is still empty.
    pub fn add_result(&mut self, distance: f64, dist: &ClassDistribution, label: &str) -> f64 {
        let k = self.entries.len();
        for i in 0..k {
            let e = &mut self.entries[i];
            if e.occupied && (distance - e.distance).abs() < DISTANCE_EPSILON {
                // Tied: merge into the bucket.
                e.aggregate.merge(dist);
                if self.store_instances && e.labels.len() < self.max_bests {
                    e.labels.push(label.to_owned());
                    e.label_dists.push(dist.clone());
                }
                break;
            }
            if !e.occupied {
                // Buckets fill front to back, so everything past an empty
                // bucket is empty too.
                e.reset_to(distance, dist, label, self.store_instances);
                break;
            }
            if distance < e.distance {
                if i == k - 1 {
                    // Replace the current worst bucket.
                    e.reset_to(distance, dist, label, self.store_instances);
                } else {
                    // Insert: rotate the last bucket into position i as
                    // scratch, shifting the rest down one rank.
                    self.entries[i..].rotate_right(1);
                    self.entries[i].reset_to(distance, dist, label, self.store_instances);
                }
                break;
            }
        }
        let last = &self.entries[k - 1];
        if last.occupied {
            last.distance
        } else {
            f64::INFINITY
        }
    }

    /// Voting weight of bucket `j` under `decay`.
    pub fn relative_weight(&self, j: usize, decay: Decay) -> f64 {
        match decay {
            Decay::Zero => 1.0,
            Decay::InvDist => 1.0 / (self.entries[j].distance + DISTANCE_EPSILON),
            Decay::InvLinear => {
                let occupied = self.occupied_len();
                if j == 0 || occupied <= 1 {
                    return 1.0;
                }
                let nearest = self.entries[0].distance;
                let furthest = self.entries[occupied - 1].distance;
                if furthest - nearest <= 0.0 {
                    1.0
                } else {
                    (furthest - self.entries[j].distance) / (furthest - nearest)
                }
            }
            Decay::ExpDecay { alpha, beta } => {
                (-alpha * self.entries[j].distance.powf(beta)).exp()
            }
        }
    }

    /// Decay-weighted vote over all occupied buckets.
    pub fn vote(&self, decay: Decay) -> ClassDistribution {
        let mut out = ClassDistribution::new();
        for j in 0..self.occupied_len() {
            let r = self.relative_weight(j, decay);
            out.merge_weighted(&self.entries[j].aggregate, r);
        }
        out
    }

    /// Snapshot the buckets into a [`NeighborSet`] report.
    pub fn to_neighbor_set(&self) -> NeighborSet {
        let mut ns = NeighborSet::new(
            self.max_bests,
            self.store_instances,
            self.show_distance,
            self.show_distribution,
        );
        for e in &self.entries {
            if !e.occupied {
                break;
            }
            ns.push(Neighbor {
                distance: e.distance,
                total: e.aggregate.total_items(),
                distribution: e.aggregate.clone(),
                labels: e.labels.clone(),
                label_dists: e.label_dists.clone(),
            });
        }
        ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dist(pairs: &[(usize, u64)]) -> ClassDistribution {
        let mut d = ClassDistribution::new();
        for &(t, f) in pairs {
            d.inc_freq(t, f);
        }
        d
    }

    fn array(k: usize) -> BestArray {
        let mut b = BestArray::new();
        b.init(k, 2, true, false, false);
        b
    }

    #[test]
    fn threshold_is_infinite_while_buckets_are_empty() {
        let mut b = array(3);
        let t = b.add_result(1.0, &dist(&[(0, 1)]), "a");
        assert!(t.is_infinite());
        let t = b.add_result(2.0, &dist(&[(0, 1)]), "b");
        assert!(t.is_infinite());
        let t = b.add_result(3.0, &dist(&[(0, 1)]), "c");
        assert_relative_eq!(t, 3.0);
    }

    #[test]
    fn distances_stay_sorted_under_inserts() {
        let mut b = array(3);
        b.add_result(5.0, &dist(&[(0, 1)]), "a");
        b.add_result(1.0, &dist(&[(0, 1)]), "b");
        b.add_result(3.0, &dist(&[(0, 1)]), "c");
        b.add_result(2.0, &dist(&[(0, 1)]), "d");
        let distances: Vec<f64> = (0..3).map(|j| b.entry(j).unwrap().distance()).collect();
        assert_eq!(distances, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn worse_candidates_are_silently_ignored() {
        let mut b = array(1);
        b.add_result(1.0, &dist(&[(0, 1)]), "a");
        let t = b.add_result(9.0, &dist(&[(1, 5)]), "b");
        assert_relative_eq!(t, 1.0);
        assert_eq!(b.entry(0).unwrap().aggregate().frequency(0), 1);
        assert_eq!(b.entry(0).unwrap().aggregate().frequency(1), 0);
    }

    #[test]
    fn tie_merge_aggregates_all_with_capped_labels() {
        let mut b = array(1);
        b.add_result(0.5, &dist(&[(0, 1)]), "first");
        b.add_result(0.5, &dist(&[(1, 2)]), "second");
        b.add_result(0.5, &dist(&[(0, 3)]), "third");
        let e = b.entry(0).unwrap();
        assert_eq!(e.aggregate().frequency(0), 4);
        assert_eq!(e.aggregate().frequency(1), 2);
        // max_bests = 2: labels truncate in insertion order.
        assert_eq!(e.labels(), &["first", "second"]);
        assert_eq!(e.label_dists().len(), 2);
    }

    #[test]
    fn tie_merge_is_order_independent() {
        let inputs = [
            (0.5, dist(&[(0, 1)])),
            (0.5, dist(&[(1, 2)])),
            (0.5, dist(&[(0, 3)])),
        ];
        let mut forward = array(1);
        for (d, c) in &inputs {
            forward.add_result(*d, c, "x");
        }
        let mut backward = array(1);
        for (d, c) in inputs.iter().rev() {
            backward.add_result(*d, c, "x");
        }
        assert_eq!(
            forward.entry(0).unwrap().aggregate(),
            backward.entry(0).unwrap().aggregate()
        );
    }

    #[test]
    fn replace_evicts_the_worst_bucket() {
        let mut b = array(2);
        b.add_result(4.0, &dist(&[(0, 1)]), "a");
        b.add_result(6.0, &dist(&[(1, 1)]), "b");
        let t = b.add_result(5.0, &dist(&[(2, 1)]), "c");
        assert_relative_eq!(t, 5.0);
        assert_relative_eq!(b.entry(0).unwrap().distance(), 4.0);
        assert_relative_eq!(b.entry(1).unwrap().distance(), 5.0);
        assert_eq!(b.entry(1).unwrap().aggregate().frequency(2), 1);
    }

    #[test]
    fn init_reuses_buckets_across_queries() {
        let mut b = array(2);
        b.add_result(1.0, &dist(&[(0, 1)]), "a");
        b.init(2, 2, true, false, false);
        assert_eq!(b.occupied_len(), 0);
        let t = b.add_result(0.25, &dist(&[(1, 1)]), "b");
        assert!(t.is_infinite());
        assert_eq!(b.entry(0).unwrap().aggregate().frequency(1), 1);
    }

    #[test]
    fn zero_decay_weights_every_bucket_equally() {
        let mut b = array(3);
        b.add_result(0.0, &dist(&[(0, 1)]), "a");
        b.add_result(1.0, &dist(&[(0, 1), (1, 1)]), "b");
        assert_relative_eq!(b.relative_weight(0, Decay::Zero), 1.0);
        assert_relative_eq!(b.relative_weight(1, Decay::Zero), 1.0);
        let vote = b.vote(Decay::Zero);
        assert_eq!(vote.frequency(0), 2);
        assert_eq!(vote.frequency(1), 1);
    }

    #[test]
    fn inv_dist_decay_favors_the_nearest_bucket() {
        let mut b = array(2);
        b.add_result(0.0, &dist(&[(0, 1)]), "a");
        b.add_result(1.0, &dist(&[(1, 1)]), "b");
        let w0 = b.relative_weight(0, Decay::InvDist);
        let w1 = b.relative_weight(1, Decay::InvDist);
        assert!(w0 > w1);
        let vote = b.vote(Decay::InvDist);
        let best = vote.iter().max_by(|a, b| a.2.partial_cmp(&b.2).unwrap());
        assert_eq!(best.unwrap().0, 0);
    }

    #[test]
    fn inv_linear_decay_interpolates_between_extremes() {
        let mut b = array(3);
        b.add_result(0.0, &dist(&[(0, 1)]), "a");
        b.add_result(1.0, &dist(&[(1, 1)]), "b");
        b.add_result(2.0, &dist(&[(2, 1)]), "c");
        assert_relative_eq!(b.relative_weight(0, Decay::InvLinear), 1.0);
        assert_relative_eq!(b.relative_weight(1, Decay::InvLinear), 0.5);
        assert_relative_eq!(b.relative_weight(2, Decay::InvLinear), 0.0);
    }

    #[test]
    fn exp_decay_weights() {
        let mut b = array(2);
        b.add_result(0.0, &dist(&[(0, 1)]), "a");
        b.add_result(2.0, &dist(&[(1, 1)]), "b");
        let decay = Decay::ExpDecay {
            alpha: 1.0,
            beta: 1.0,
        };
        assert_relative_eq!(b.relative_weight(0, decay), 1.0);
        assert_relative_eq!(b.relative_weight(1, decay), (-2.0f64).exp());
    }

    #[test]
    fn single_bucket_inv_linear_weight_is_one() {
        let mut b = array(1);
        b.add_result(0.7, &dist(&[(0, 1)]), "a");
        assert_relative_eq!(b.relative_weight(0, Decay::InvLinear), 1.0);
    }
}
