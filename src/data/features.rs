//! The ordered set of features and its search permutation.
//!
//! Testers walk features in descending-weight order so that early
//! termination prunes as soon as possible. The permutation covers only
//! non-ignored features; weight ties keep the original feature order.

use std::fmt::Write as _;

use crate::data::feature::Feature;

/// All features of a model, plus the weight-ordered search permutation.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    feats: Vec<Feature>,
    permutation: Vec<usize>,
}

impl FeatureSet {
    /// Create `n` empty features.
    pub fn new(n: usize) -> Self {
        Self {
            feats: (0..n).map(|_| Feature::new()).collect(),
            permutation: Vec::new(),
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.feats.len()
    }

    /// True when there are no features.
    pub fn is_empty(&self) -> bool {
        self.feats.is_empty()
    }

    /// Feature by index.
    pub fn get(&self, idx: usize) -> Option<&Feature> {
        self.feats.get(idx)
    }

    /// Mutable feature by index.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Feature> {
        self.feats.get_mut(idx)
    }

    /// Iterate features in original order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.feats.iter()
    }

    /// Iterate features mutably in original order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.feats.iter_mut()
    }

    /// Number of features not marked ignore.
    pub fn effective_features(&self) -> usize {
        self.feats.iter().filter(|f| !f.ignored()).count()
    }

    /// Number of numeric features.
    pub fn numeric_features(&self) -> usize {
        self.feats.iter().filter(|f| f.is_numeric()).count()
    }

    /// Recompute the search permutation from the current weights:
    /// non-ignored feature indices by descending weight, ties keeping the
    /// original order.
    pub fn calculate_permutation(&mut self) {
        let mut perm: Vec<usize> = (0..self.feats.len())
            .filter(|&i| !self.feats[i].ignored())
            .collect();
        perm.sort_by(|&a, &b| {
            self.feats[b]
                .weight()
                .partial_cmp(&self.feats[a].weight())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        self.permutation = perm;
    }

    /// The search permutation (empty until calculated).
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Render the permutation as `< a, b, c >` (1-based, the conventional
    /// report form).
    pub fn write_permutation(&self) -> String {
        let mut out = String::from("<");
        let mut first = true;
        for &idx in &self.permutation {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, " {}", idx + 1);
        }
        out.push_str(" >");
        out
    }
}

impl std::ops::Index<usize> for FeatureSet {
    type Output = Feature;

    fn index(&self, idx: usize) -> &Feature {
        &self.feats[idx]
    }
}

impl std::ops::IndexMut<usize> for FeatureSet {
    fn index_mut(&mut self, idx: usize) -> &mut Feature {
        &mut self.feats[idx]
    }
}
