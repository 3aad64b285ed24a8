//! Class distributions.
//!
//! A [`ClassDistribution`] is a multiset over target labels: for each target
//! (by dense index) it records an integer frequency and a real-valued weight.
//! Distributions start **unweighted**, meaning the weight of every entry
//! tracks its frequency. Any operation that writes an explicit weight
//! (exemplar weights, decay-weighted merging, normalization) switches the
//! distribution to the **weighted** variant; from then on `best_target`,
//! `merge` and the save formats dispatch on weights instead of raw counts.
//!
//! The text serialization formats are part of the model file contract:
//! `save` emits entries keyed by dense target index, `save_hashed` by
//! interned name id. Both round-trip exactly, including weights.

use std::collections::BTreeMap;

use crate::data::targets::Targets;

/// Tolerance for normalization checks (weights summing to 1).
pub const NORM_EPSILON: f64 = 1e-9;

/// Outcome of a `best_target` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    /// Dense index of the winning target.
    pub target: usize,
    /// True when another target scored exactly as well; the winner is then
    /// the one with the smallest index.
    pub is_tie: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    frequency: u64,
    weight: f64,
}

/// Distribution parsing errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistParseError {
    /// The text is not a valid `{ idx freq[, ...] }` form.
    #[error("malformed distribution text: {0}")]
    Malformed(String),

    /// An entry references a target index the registry does not know and
    /// on-demand creation is disabled.
    #[error("distribution references unknown target index {0}")]
    UnknownTarget(usize),

    /// An entry references an interned name id the registry does not know
    /// and on-demand creation is disabled.
    #[error("distribution references unknown target id {0}")]
    UnknownTargetId(usize),
}

/// Multiset of (target, frequency, weight).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDistribution {
    entries: BTreeMap<usize, Entry>,
    total_items: u64,
    weighted: bool,
}

impl ClassDistribution {
    /// Create an empty, unweighted distribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct targets present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no targets are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry frequencies.
    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    /// True once any explicit weight has been written.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Remove all entries. The weighted tag is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_items = 0;
    }

    /// Frequency of one target (0 when absent).
    pub fn frequency(&self, target: usize) -> u64 {
        self.entries.get(&target).map_or(0, |e| e.frequency)
    }

    /// Weight of one target (0 when absent).
    pub fn weight(&self, target: usize) -> f64 {
        self.entries.get(&target).map_or(0.0, |e| e.weight)
    }

    /// Sum of all entry weights.
    pub fn total_weight(&self) -> f64 {
        self.entries.values().map(|e| e.weight).sum()
    }

    /// Iterate `(target, frequency, weight)` in ascending target order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64, f64)> + '_ {
        self.entries
            .iter()
            .map(|(&t, e)| (t, e.frequency, e.weight))
    }

    /// Set a target's frequency outright; the weight follows the frequency.
    pub fn set_freq(&mut self, target: usize, freq: u64) {
        let old = self.entries.get(&target).map_or(0, |e| e.frequency);
        self.total_items = self.total_items - old + freq;
        self.entries.insert(
            target,
            Entry {
                frequency: freq,
                weight: freq as f64,
            },
        );
    }

    /// Set a target's frequency and an explicit weight. Marks the
    /// distribution weighted.
    pub fn set_freq_weighted(&mut self, target: usize, freq: u64, weight: f64) {
        let old = self.entries.get(&target).map_or(0, |e| e.frequency);
        self.total_items = self.total_items - old + freq;
        self.entries.insert(
            target,
            Entry {
                frequency: freq,
                weight,
            },
        );
        self.weighted = true;
    }

    /// Add `by` occurrences of a target. Returns true when the entry was
    /// newly created. Each occurrence carries unit weight.
    pub fn inc_freq(&mut self, target: usize, by: u64) -> bool {
        self.total_items += by;
        match self.entries.get_mut(&target) {
            Some(e) => {
                e.frequency += by;
                e.weight += by as f64;
                false
            }
            None => {
                self.entries.insert(
                    target,
                    Entry {
                        frequency: by,
                        weight: by as f64,
                    },
                );
                true
            }
        }
    }

    /// Add `by` occurrences with an explicit total weight. Marks the
    /// distribution weighted.
    pub fn inc_freq_weighted(&mut self, target: usize, by: u64, weight: f64) -> bool {
        self.weighted = true;
        self.total_items += by;
        match self.entries.get_mut(&target) {
            Some(e) => {
                e.frequency += by;
                e.weight += weight;
                false
            }
            None => {
                self.entries.insert(
                    target,
                    Entry {
                        frequency: by,
                        weight,
                    },
                );
                true
            }
        }
    }

    /// Remove one occurrence of a target; the entry disappears when its
    /// frequency reaches zero.
    pub fn dec_freq(&mut self, target: usize) {
        if let Some(e) = self.entries.get_mut(&target) {
            e.frequency -= 1;
            if !self.weighted {
                e.weight = e.frequency as f64;
            }
            self.total_items -= 1;
            if e.frequency == 0 {
                self.entries.remove(&target);
            }
        }
    }

    /// Add another distribution into this one, frequency by frequency and
    /// weight by weight. Missing entries are created.
    pub fn merge(&mut self, other: &ClassDistribution) {
        self.weighted |= other.weighted;
        for (target, freq, weight) in other.iter() {
            self.total_items += freq;
            let e = self.entries.entry(target).or_insert(Entry {
                frequency: 0,
                weight: 0.0,
            });
            e.frequency += freq;
            e.weight += weight;
        }
    }

    /// Decay-weighted merge: frequencies add, weights add scaled by
    /// `factor`. Marks the distribution weighted.
    pub fn merge_weighted(&mut self, other: &ClassDistribution, factor: f64) {
        self.weighted = true;
        for (target, freq, weight) in other.iter() {
            self.total_items += freq;
            let e = self.entries.entry(target).or_insert(Entry {
                frequency: 0,
                weight: 0.0,
            });
            e.frequency += freq;
            e.weight += factor * weight;
        }
    }

    /// Shannon entropy (base 2) of the frequency-normalized distribution.
    /// An empty distribution has entropy 0.
    pub fn entropy(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        let total = self.total_items as f64;
        let mut h = 0.0;
        for e in self.entries.values() {
            if e.frequency > 0 {
                let p = e.frequency as f64 / total;
                h -= p * p.log2();
            }
        }
        h
    }

    /// The winning target of this distribution.
    ///
    /// Unweighted distributions vote by frequency; weighted ones by weight,
    /// falling back to frequency on exact weight ties. Remaining ties pick
    /// the smallest target index and set [`Vote::is_tie`]. With
    /// `ignore_unknown`, placeholder targets are excluded from the vote.
    pub fn best_target(&self, targets: &Targets, ignore_unknown: bool) -> Option<Vote> {
        let mut best: Option<(usize, Entry)> = None;
        let mut is_tie = false;
        for (&target, &e) in &self.entries {
            if ignore_unknown && targets.is_placeholder(target) {
                continue;
            }
            match best {
                None => best = Some((target, e)),
                Some((_, b)) => {
                    if self.weighted {
                        if e.weight > b.weight {
                            best = Some((target, e));
                            is_tie = false;
                        } else if e.weight == b.weight {
                            if e.frequency > b.frequency {
                                best = Some((target, e));
                                is_tie = false;
                            } else if e.frequency == b.frequency {
                                is_tie = true;
                            }
                        }
                    } else if e.frequency > b.frequency {
                        best = Some((target, e));
                        is_tie = false;
                    } else if e.frequency == b.frequency {
                        is_tie = true;
                    }
                }
            }
        }
        best.map(|(target, _)| Vote { target, is_tie })
    }

    /// Share of the total weight held by one target. 0 when the target is
    /// absent or the distribution is empty.
    pub fn confidence(&self, target: usize) -> f64 {
        let total = self.total_weight();
        if total <= 0.0 {
            return 0.0;
        }
        self.weight(target) / total
    }

    /// Scale weights so they sum to 1. Marks the distribution weighted.
    pub fn normalize(&mut self) {
        let total = self.total_weight();
        if total <= 0.0 {
            return;
        }
        for e in self.entries.values_mut() {
            e.weight /= total;
        }
        self.weighted = true;
    }

    /// Smoothed normalization: mixes the normalized weights with a uniform
    /// distribution over every registered target, at mixture rate `factor`
    /// (in `[0, 1]`). Afterwards weights sum to 1 and every target holds at
    /// least `factor / |targets|`. Missing entries are created with
    /// frequency 0. No-op on an empty distribution or an empty registry.
    pub fn normalize_1(&mut self, factor: f64, targets: &Targets) {
        let n = targets.total_values();
        if n == 0 || self.entries.is_empty() {
            return;
        }
        self.normalize();
        let floor = factor / n as f64;
        for idx in 0..n {
            let e = self.entries.entry(idx).or_insert(Entry {
                frequency: 0,
                weight: 0.0,
            });
            e.weight = (1.0 - factor) * e.weight + floor;
        }
    }

    /// Scale weights so they sum to 2.
    pub fn normalize_2(&mut self) {
        let total = self.total_weight();
        if total <= 0.0 {
            return;
        }
        for e in self.entries.values_mut() {
            e.weight = 2.0 * e.weight / total;
        }
        self.weighted = true;
    }

    /// Serialize as `{ idx freq, ... }` (weighted: `{ idx freq weight, ... }`),
    /// ordered by dense target index.
    pub fn save(&self) -> String {
        self.render(|target| target.to_string())
    }

    /// Serialize keyed by interned name id instead of dense index.
    pub fn save_hashed(&self, targets: &Targets) -> String {
        self.render(|target| {
            targets
                .get(target)
                .map_or_else(|| "0".to_string(), |tv| tv.name_id().to_string())
        })
    }

    /// Human-readable form with resolved label names, used in reports.
    pub fn to_display_string(
        &self,
        targets: &Targets,
        interner: &crate::interner::StringInterner,
    ) -> String {
        self.render(|target| {
            targets
                .get(target)
                .and_then(|tv| tv.name(interner))
                .unwrap_or("?")
                .to_string()
        })
    }

    fn render(&self, mut key: impl FnMut(usize) -> String) -> String {
        let mut out = String::from("{ ");
        let mut first = true;
        for (target, freq, weight) in self.iter() {
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(&key(target));
            out.push(' ');
            out.push_str(&freq.to_string());
            if self.weighted {
                out.push(' ');
                out.push_str(&weight.to_string());
            }
        }
        out.push_str(" }");
        out
    }

    /// Parse the `save` form against a live registry. Unknown dense indices
    /// create placeholder targets when `create_missing` is set.
    pub fn read(
        text: &str,
        targets: &mut Targets,
        create_missing: bool,
    ) -> Result<Self, DistParseError> {
        Self::parse_with(text, targets, |idx, targets| {
            while targets.total_values() <= idx {
                if !create_missing {
                    return Err(DistParseError::UnknownTarget(idx));
                }
                targets.add_placeholder();
            }
            Ok(idx)
        })
    }

    /// Parse the `save_hashed` form against a live registry. Unknown name
    /// ids register fresh targets when `create_missing` is set.
    pub fn read_hashed(
        text: &str,
        targets: &mut Targets,
        create_missing: bool,
    ) -> Result<Self, DistParseError> {
        Self::parse_with(text, targets, |name_id, targets| {
            match targets.lookup(name_id) {
                Some(idx) => Ok(idx),
                None if create_missing => Ok(targets.add_value(name_id, 0)),
                None => Err(DistParseError::UnknownTargetId(name_id)),
            }
        })
    }

    fn parse_with<R>(
        text: &str,
        targets: &mut Targets,
        mut resolve: R,
    ) -> Result<Self, DistParseError>
    where
        R: FnMut(usize, &mut Targets) -> Result<usize, DistParseError>,
    {
        let inner = text
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| DistParseError::Malformed(text.to_string()))?
            .trim();
        let mut dist = ClassDistribution::new();
        if inner.is_empty() {
            return Ok(dist);
        }
        let mut arity: Option<usize> = None;
        for part in inner.split(',') {
            let fields: Vec<&str> = part.split_whitespace().collect();
            if fields.len() != 2 && fields.len() != 3 {
                return Err(DistParseError::Malformed(part.to_string()));
            }
            if *arity.get_or_insert(fields.len()) != fields.len() {
                return Err(DistParseError::Malformed(text.to_string()));
            }
            let key: usize = fields[0]
                .parse()
                .map_err(|_| DistParseError::Malformed(part.to_string()))?;
            let freq: u64 = fields[1]
                .parse()
                .map_err(|_| DistParseError::Malformed(part.to_string()))?;
            let target = resolve(key, targets)?;
            if fields.len() == 3 {
                let weight: f64 = fields[2]
                    .parse()
                    .map_err(|_| DistParseError::Malformed(part.to_string()))?;
                dist.set_freq_weighted(target, freq, weight);
            } else {
                dist.set_freq(target, freq);
            }
        }
        Ok(dist)
    }
}
