//! The memory-based learner.
//!
//! [`MblModel::train`] ingests a labeled dataset into the exemplar store,
//! computes per-feature statistics and weights, builds the search
//! permutation and any prestored distance matrices, then freezes. A frozen
//! model is immutable: [`MblModel::classify`] and friends only read it, so
//! batch classification fans out across threads with one tester and one
//! accumulator per worker.
//!
//! Identical training vectors are deduplicated into one exemplar carrying an
//! aggregated class distribution; every candidate therefore hands the k-best
//! accumulator a distribution rather than a single label.

use std::collections::HashMap;

use crate::data::distribution::ClassDistribution;
use crate::data::feature::FeatureError;
use crate::data::features::FeatureSet;
use crate::data::instance::{Dataset, Instance, SchemaError};
use crate::data::targets::Targets;
use crate::eval::TestStatistics;
use crate::interner::StringInterner;
use crate::logger::TrainingLogger;
use crate::metric::{MetricKind, QueryValue};
use crate::model::config::{ConfigError, MblConfig, OptionTable, WeightKind};
use crate::model::Normalization;
use crate::search::best::{BestArray, DISTANCE_EPSILON};
use crate::search::neighbors::NeighborSet;
use crate::search::tester::tester_for;
use crate::utils::run_with_threads;

/// Training-time errors. These abort training; nothing is partially built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainError {
    /// The configuration is inconsistent with itself or the dataset.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The dataset violates the schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Nothing to train on.
    #[error("training dataset is empty")]
    EmptyDataset,

    /// A feature-level failure during matrix construction.
    #[error("feature {feature}: {source}")]
    Feature {
        feature: usize,
        source: FeatureError,
    },
}

/// One deduplicated training pattern with its aggregated class distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    values: Vec<u32>,
    dist: ClassDistribution,
}

impl Exemplar {
    /// Dense value ids, one per feature.
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// How instances with this pattern distribute over targets.
    pub fn dist(&self) -> &ClassDistribution {
        &self.dist
    }

    /// Rebuild from persisted parts.
    pub fn from_parts(values: Vec<u32>, dist: ClassDistribution) -> Self {
        Self { values, dist }
    }
}

/// The outcome of classifying one query.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Predicted class label.
    pub predicted: String,
    /// Dense index of the predicted target.
    pub predicted_index: usize,
    /// The final (decayed, normalized) vote distribution.
    pub distribution: ClassDistribution,
    /// Distance of the nearest bucket.
    pub distance: f64,
    /// True when the vote tied and broke on the smallest target index.
    pub is_tie: bool,
    /// True when the nearest bucket sits at distance (almost) zero.
    pub exact_match: bool,
    /// Neighbor report, when `store_neighbors` is on.
    pub neighbors: Option<NeighborSet>,
}

impl Classification {
    /// Confidence of the predicted class within the vote distribution.
    pub fn confidence(&self) -> f64 {
        self.distribution.confidence(self.predicted_index)
    }
}

/// A trained memory-based classifier.
#[derive(Debug, Clone)]
pub struct MblModel {
    interner: StringInterner,
    targets: Targets,
    features: FeatureSet,
    exemplars: Vec<Exemplar>,
    options: OptionTable,
    target_entropy: f64,
    n_instances: u64,
}

impl MblModel {
    // =========================================================================
    // Training
    // =========================================================================

    /// Train a model on a dataset.
    pub fn train(config: MblConfig, dataset: &Dataset) -> Result<Self, TrainError> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(TrainError::EmptyDataset);
        }
        let n_features = dataset.n_features().unwrap_or(0);
        config.validate_for_arity(n_features)?;

        let logger = TrainingLogger::new(config.verbosity);
        let mut interner = StringInterner::new();
        let mut targets = Targets::new();
        let mut features = FeatureSet::new(n_features);

        for fi in 0..n_features {
            features[fi].set_matrix_clip_freq(config.matrix_clip_freq);
        }
        for &(fi, metric) in &config.feature_metrics {
            features[fi].set_metric_override(Some(metric));
        }
        for &fi in &config.ignored_features {
            features[fi].set_ignored(true);
        }
        for fi in 0..n_features {
            if features[fi].effective_metric(config.metric) == MetricKind::Numeric {
                features[fi].set_numeric(true);
            }
        }

        // Ingest: frequency bookkeeping plus the deduplicated exemplar store.
        let weighted = dataset.has_weights();
        let mut exemplars: Vec<Exemplar> = Vec::new();
        let mut exemplar_index: HashMap<Vec<u32>, usize> = HashMap::new();
        let mut n_instances = 0u64;
        for sample in dataset.samples() {
            let mut instance = Instance::new(n_features);
            instance.occurrences = sample.occurrences.max(1);
            instance.sample_weight = sample.weight;
            let occ = u64::from(instance.occurrences);
            let target = targets.add_value(interner.intern(&sample.label), occ);
            instance.target = target as u32;
            for (fi, token) in sample.values.iter().enumerate() {
                let name_id = interner.intern(token);
                instance.values[fi] = features[fi].add_value(name_id, target, occ) as u32;
            }
            n_instances += occ;
            let slot = match exemplar_index.get(&instance.values) {
                Some(&i) => i,
                None => {
                    exemplar_index.insert(instance.values.clone(), exemplars.len());
                    exemplars.push(Exemplar {
                        values: instance.values.clone(),
                        dist: ClassDistribution::new(),
                    });
                    exemplars.len() - 1
                }
            };
            if weighted {
                exemplars[slot].dist.inc_freq_weighted(
                    target,
                    occ,
                    instance.sample_weight * occ as f64,
                );
            } else {
                exemplars[slot].dist.inc_freq(target, occ);
            }
        }

        // Numeric features parse their vocabularies and record ranges.
        for fi in 0..n_features {
            if !features[fi].is_numeric() {
                continue;
            }
            if let crate::data::feature::NumericStatus::NotNumeric(token) =
                features[fi].prepare_numeric_stats(&interner)
            {
                return Err(SchemaError::NotNumeric {
                    feature: fi,
                    value: token,
                }
                .into());
            }
        }

        // Statistics, weights, permutation.
        let target_entropy = Self::entropy_of(&targets);
        for fi in 0..n_features {
            features[fi].statistics(target_entropy, &targets, config.bin_size);
        }
        Self::fill_weights(&config, &mut features);
        features.calculate_permutation();

        // Prestored matrices for storable metrics.
        for fi in 0..n_features {
            if features[fi].ignored() {
                continue;
            }
            let metric = features[fi].effective_metric(config.metric);
            if metric.is_storable() {
                features[fi]
                    .store_matrix(metric, &interner)
                    .map_err(|source| match source {
                        FeatureError::StorableOnNumeric(metric) => {
                            TrainError::Config(ConfigError::StorableOnNumericFeature {
                                feature: fi,
                                metric,
                            })
                        }
                        source => TrainError::Feature {
                            feature: fi,
                            source,
                        },
                    })?;
            }
        }

        logger.info(format!(
            "trained on {} instances ({} exemplars), {} features, {} classes",
            n_instances,
            exemplars.len(),
            n_features,
            targets.effective_values()
        ));
        if logger.verbosity() >= crate::logger::Verbosity::Debug {
            for (fi, feat) in features.iter().enumerate() {
                logger.debug(format!(
                    "feature {}: weight {:.6}, {} values, gain ratio {:.6}",
                    fi + 1,
                    feat.weight(),
                    feat.total_values(),
                    feat.gain_ratio()
                ));
            }
            logger.debug(format!("permutation {}", features.write_permutation()));
        }

        let mut options = OptionTable::new(config);
        options.freeze();

        Ok(Self {
            interner,
            targets,
            features,
            exemplars,
            options,
            target_entropy,
            n_instances,
        })
    }

    fn entropy_of(targets: &Targets) -> f64 {
        let total = targets.total_frequency();
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        let mut h = 0.0;
        for tv in targets.iter() {
            if tv.frequency() > 0 {
                let p = tv.frequency() as f64 / n;
                h -= p * p.log2();
            }
        }
        h
    }

    fn fill_weights(config: &MblConfig, features: &mut FeatureSet) {
        for (fi, feat) in features.iter_mut().enumerate() {
            let weight = match config.weighting {
                WeightKind::NoWeight => 1.0,
                WeightKind::GainRatio => feat.gain_ratio(),
                WeightKind::InfoGain => feat.info_gain(),
                WeightKind::ChiSquare => feat.chi_square(),
                WeightKind::SharedVariance => feat.shared_variance(),
                WeightKind::StandardDeviation => feat.standard_deviation(),
                WeightKind::User => config
                    .user_weights
                    .as_ref()
                    .map_or(1.0, |w| w[fi]),
            };
            feat.set_weight(weight);
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify one query given as raw tokens, one per feature.
    pub fn classify<S: AsRef<str>>(&self, query: &[S]) -> Result<Classification, SchemaError> {
        let resolved = self.resolve_query(query)?;
        Ok(self.classify_resolved(&resolved))
    }

    /// Classify a batch of queries, in parallel when `n_threads` allows.
    pub fn classify_batch(
        &self,
        queries: &[Vec<String>],
    ) -> Vec<Result<Classification, SchemaError>> {
        let n_threads = self.options.config().n_threads;
        run_with_threads(n_threads, |parallelism| {
            parallelism.maybe_par_map(queries, |q| self.classify(q))
        })
    }

    /// Classify every sample of a labeled test set and count the outcomes.
    pub fn evaluate(&self, dataset: &Dataset) -> TestStatistics {
        let mut stats = TestStatistics::new();
        for sample in dataset.samples() {
            match self.classify(&sample.values) {
                Err(_) => stats.add_skipped(),
                Ok(c) => {
                    stats.add_line();
                    if c.exact_match {
                        stats.add_exact();
                    }
                    if c.predicted == sample.label {
                        stats.add_correct();
                        if c.is_tie {
                            stats.add_tie_correct();
                        }
                    } else if c.is_tie {
                        stats.add_tie_failure();
                    }
                }
            }
        }
        stats
    }

    /// Resolve raw tokens against the frozen vocabularies.
    fn resolve_query<S: AsRef<str>>(&self, query: &[S]) -> Result<Vec<QueryValue<'_>>, SchemaError> {
        let n = self.features.len();
        if query.len() != n {
            return Err(SchemaError::ArityMismatch {
                expected: n,
                got: query.len(),
            });
        }
        let mut resolved = Vec::with_capacity(n);
        for (fi, token) in query.iter().enumerate() {
            let token = token.as_ref();
            let feat = &self.features[fi];
            if feat.ignored() {
                resolved.push(QueryValue::Unknown);
            } else if feat.is_numeric() {
                let v: f64 = token.parse().map_err(|_| SchemaError::NotNumeric {
                    feature: fi,
                    value: token.to_string(),
                })?;
                resolved.push(QueryValue::Numeric(v));
            } else {
                let known = self
                    .interner
                    .get(token)
                    .and_then(|id| feat.lookup(id))
                    .and_then(|vi| feat.value(vi));
                match known {
                    Some(fv) => resolved.push(QueryValue::Value(fv)),
                    None => resolved.push(QueryValue::Unknown),
                }
            }
        }
        Ok(resolved)
    }

    /// Run the search and vote for a resolved query.
    fn classify_resolved(&self, query: &[QueryValue<'_>]) -> Classification {
        let cfg = self.options.config();
        let mut tester = tester_for(cfg.metric, &self.features, cfg.vd_threshold)
            .expect("per-feature metrics were validated at training");
        let window = tester.window();
        tester.init(query, window, 0);

        let mut best = BestArray::new();
        best.init(
            cfg.num_neighbors,
            cfg.max_bests,
            cfg.store_neighbors,
            cfg.show_distance,
            cfg.show_distribution,
        );

        let mut threshold = f64::INFINITY;
        for exemplar in &self.exemplars {
            // Epsilon headroom keeps candidates that tie the k-th distance.
            let prefix = tester.test(&exemplar.values, threshold + DISTANCE_EPSILON);
            if prefix == window {
                let label = if cfg.store_neighbors {
                    self.exemplar_label(exemplar)
                } else {
                    String::new()
                };
                threshold = best.add_result(tester.distance(window), &exemplar.dist, &label);
            }
        }

        let mut distribution = best.vote(cfg.decay);
        match cfg.normalization {
            Normalization::None => {}
            Normalization::Probability => distribution.normalize(),
            Normalization::AddFactor(factor) => distribution.normalize_1(factor, &self.targets),
        }

        let vote = distribution
            .best_target(&self.targets, true)
            .unwrap_or_else(|| {
                // Nothing voted (all candidates pruned): fall back to the
                // training majority class.
                crate::data::distribution::Vote {
                    target: self
                        .targets
                        .majority_class()
                        .map(|tv| tv.index())
                        .unwrap_or(0),
                    is_tie: false,
                }
            });

        let distance = match best.entry(0) {
            Some(e) if e.occupied() => e.distance(),
            _ => f64::INFINITY,
        };

        Classification {
            predicted: self
                .targets
                .get(vote.target)
                .and_then(|tv| tv.name(&self.interner))
                .unwrap_or("?")
                .to_string(),
            predicted_index: vote.target,
            distribution,
            distance,
            is_tie: vote.is_tie,
            exact_match: distance.abs() < DISTANCE_EPSILON,
            neighbors: cfg.store_neighbors.then(|| best.to_neighbor_set()),
        }
    }

    /// Render an exemplar as a space-joined value line for neighbor reports.
    fn exemplar_label(&self, exemplar: &Exemplar) -> String {
        let mut parts = Vec::with_capacity(exemplar.values.len());
        for (fi, &vi) in exemplar.values.iter().enumerate() {
            let name = self.features[fi]
                .value(vi as usize)
                .and_then(|fv| fv.name(&self.interner))
                .unwrap_or("?");
            parts.push(name);
        }
        parts.join(" ")
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The string interner shared by targets and feature vocabularies.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// The target registry.
    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// The feature set.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// The deduplicated exemplar store.
    pub fn exemplars(&self) -> &[Exemplar] {
        &self.exemplars
    }

    /// The frozen option table.
    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    /// Mutable option table: query-time knobs (k, decay, normalization,
    /// reporting flags) stay settable after training.
    pub fn options_mut(&mut self) -> &mut OptionTable {
        &mut self.options
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Number of training instances (occurrences included).
    pub fn n_instances(&self) -> u64 {
        self.n_instances
    }

    /// Entropy of the training target distribution.
    pub fn target_entropy(&self) -> f64 {
        self.target_entropy
    }

    /// Reassemble a model from persisted parts (deserialization).
    pub(crate) fn from_parts(
        interner: StringInterner,
        targets: Targets,
        features: FeatureSet,
        exemplars: Vec<Exemplar>,
        options: OptionTable,
        target_entropy: f64,
        n_instances: u64,
    ) -> Self {
        Self {
            interner,
            targets,
            features,
            exemplars,
            options,
            target_entropy,
            n_instances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::instance::Sample;
    use approx::assert_relative_eq;

    /// The three-instance corpus used throughout the search tests:
    /// (A,A)->X, (A,B)->X, (B,A)->Y.
    fn corpus() -> Dataset {
        Dataset::from_rows([
            (["A", "A"], "X"),
            (["A", "B"], "X"),
            (["B", "A"], "Y"),
        ])
        .unwrap()
    }

    fn overlap_config(k: usize) -> MblConfig {
        MblConfig::builder()
            .weighting(WeightKind::NoWeight)
            .num_neighbors(k)
            .build()
            .unwrap()
    }

    #[test]
    fn training_bookkeeping_invariants() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        assert_eq!(model.n_instances(), 3);
        assert_eq!(model.targets().total_frequency(), 3);
        for feat in model.features().iter() {
            assert_eq!(feat.training_total(), 3);
            for fv in feat.iter_values() {
                assert_eq!(fv.frequency(), fv.target_dist().total_items());
            }
        }
        assert_eq!(model.exemplars().len(), 3);
        assert!(model.options().is_frozen());
    }

    #[test]
    fn exact_query_predicts_its_own_class() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        let c = model.classify(&["A", "A"]).unwrap();
        assert_eq!(c.predicted, "X");
        assert_relative_eq!(c.distance, 0.0);
        assert!(c.exact_match);
        assert!(!c.is_tie);
        assert_eq!(c.distribution.frequency(c.predicted_index), 1);
    }

    #[test]
    fn tied_nearest_neighbors_merge_into_one_bucket() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        // (B,B) is at distance 1 from (A,B) and (B,A), distance 2 from
        // (A,A); with k=1 the two distance-1 neighbors tie-merge.
        let c = model.classify(&["B", "B"]).unwrap();
        assert_relative_eq!(c.distance, 1.0);
        assert_eq!(c.distribution.frequency(0), 1); // X
        assert_eq!(c.distribution.frequency(1), 1); // Y
        // The X/Y tie breaks on the smallest target index.
        assert_eq!(c.predicted, "X");
        assert!(c.is_tie);
        assert!(!c.exact_match);
    }

    #[test]
    fn k3_with_inv_dist_decay_favors_x() {
        let mut config = overlap_config(3);
        config.decay = crate::search::Decay::InvDist;
        let model = MblModel::train(config, &corpus()).unwrap();
        let c = model.classify(&["A", "A"]).unwrap();
        assert_eq!(c.predicted, "X");
        // Buckets: distance 0 holds (A,A)->{X:1}; distance 1 holds the
        // tie-merged (A,B) and (B,A); the third bucket stays empty.
        assert_eq!(c.distribution.frequency(0), 2);
        assert_eq!(c.distribution.frequency(1), 1);
        assert!(c.distribution.weight(0) > c.distribution.weight(1));
    }

    #[test]
    fn duplicate_instances_merge_into_one_exemplar() {
        let ds = Dataset::from_rows([
            (["A", "A"], "X"),
            (["A", "A"], "X"),
            (["A", "A"], "Y"),
            (["B", "B"], "Y"),
        ])
        .unwrap();
        let model = MblModel::train(overlap_config(1), &ds).unwrap();
        assert_eq!(model.exemplars().len(), 2);
        let c = model.classify(&["A", "A"]).unwrap();
        assert_eq!(c.predicted, "X");
        assert_eq!(c.distribution.frequency(0), 2);
        assert_eq!(c.distribution.frequency(1), 1);
    }

    #[test]
    fn occurrences_multiply_into_frequencies() {
        let mut ds = Dataset::new();
        ds.push(Sample::new(["A"], "X").with_occurrences(3)).unwrap();
        ds.push(Sample::new(["B"], "Y")).unwrap();
        let model = MblModel::train(overlap_config(1), &ds).unwrap();
        assert_eq!(model.n_instances(), 4);
        assert_eq!(model.targets().get(0).unwrap().frequency(), 3);
        assert_eq!(model.features()[0].training_total(), 4);
    }

    #[test]
    fn sample_weights_produce_weighted_exemplars() {
        let mut ds = Dataset::new();
        ds.push(Sample::new(["A"], "X").with_weight(0.5)).unwrap();
        ds.push(Sample::new(["A"], "Y").with_weight(4.0)).unwrap();
        let model = MblModel::train(overlap_config(1), &ds).unwrap();
        let c = model.classify(&["A"]).unwrap();
        // The heavier exemplar wins despite equal frequencies.
        assert_eq!(c.predicted, "Y");
    }

    #[test]
    fn unknown_query_symbols_act_as_unknown_sentinel() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        let c = model.classify(&["Z", "Z"]).unwrap();
        // All three neighbors tie at the maximal distance; X outvotes Y.
        assert_eq!(c.predicted, "X");
        assert!(!c.exact_match);
    }

    #[test]
    fn arity_mismatch_fails_the_query_only() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        let err = model.classify(&["A"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ArityMismatch {
                expected: 2,
                got: 1
            }
        );
        // The model still answers well-formed queries.
        assert!(model.classify(&["A", "A"]).is_ok());
    }

    #[test]
    fn numeric_feature_rejects_bad_query_token() {
        let ds = Dataset::from_rows([(["1", "A"], "X"), (["9", "B"], "Y")]).unwrap();
        let config = MblConfig::builder()
            .weighting(WeightKind::NoWeight)
            .feature_metrics(vec![(0, MetricKind::Numeric)])
            .build()
            .unwrap();
        let model = MblModel::train(config, &ds).unwrap();
        let err = model.classify(&["not-a-number", "A"]).unwrap_err();
        assert!(matches!(err, SchemaError::NotNumeric { feature: 0, .. }));
    }

    #[test]
    fn numeric_training_token_aborts_training() {
        let ds = Dataset::from_rows([(["1", "A"], "X"), (["oops", "B"], "Y")]).unwrap();
        let config = MblConfig::builder()
            .feature_metrics(vec![(0, MetricKind::Numeric)])
            .build()
            .unwrap();
        let err = MblModel::train(config, &ds).unwrap_err();
        assert!(matches!(
            err,
            TrainError::Schema(SchemaError::NotNumeric { feature: 0, .. })
        ));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = MblModel::train(MblConfig::default(), &Dataset::new()).unwrap_err();
        assert_eq!(err, TrainError::EmptyDataset);
    }

    #[test]
    fn numeric_override_wins_over_global_storable_metric() {
        let ds = Dataset::from_rows([(["1"], "X"), (["2"], "Y")]).unwrap();
        let config = MblConfig::builder()
            .metric(MetricKind::ValueDiff)
            .feature_metrics(vec![(0, MetricKind::Numeric)])
            .build()
            .unwrap();
        let model = MblModel::train(config, &ds).unwrap();
        assert!(model.features()[0].is_numeric());
        assert!(!model.features()[0].matrix_present());
    }

    #[test]
    fn gain_ratio_weighting_prefers_the_informative_feature() {
        // Feature 0 determines the class; feature 1 is noise.
        let ds = Dataset::from_rows([
            (["A", "P"], "X"),
            (["A", "Q"], "X"),
            (["B", "P"], "Y"),
            (["B", "Q"], "Y"),
        ])
        .unwrap();
        let model = MblModel::train(MblConfig::default(), &ds).unwrap();
        let w0 = model.features()[0].weight();
        let w1 = model.features()[1].weight();
        assert!(w0 > w1);
        assert_eq!(model.features().permutation()[0], 0);
        // A query agreeing with feature 0 follows it.
        let c = model.classify(&["A", "P"]).unwrap();
        assert_eq!(c.predicted, "X");
    }

    #[test]
    fn user_weights_are_applied_verbatim() {
        let config = MblConfig::builder()
            .weighting(WeightKind::User)
            .user_weights(vec![0.25, 4.0])
            .build()
            .unwrap();
        let model = MblModel::train(config, &corpus()).unwrap();
        assert_relative_eq!(model.features()[0].weight(), 0.25);
        assert_relative_eq!(model.features()[1].weight(), 4.0);
        assert_eq!(model.features().permutation(), &[1, 0]);
    }

    #[test]
    fn ignored_features_do_not_contribute() {
        let config = MblConfig::builder()
            .weighting(WeightKind::NoWeight)
            .ignored_features(vec![1])
            .build()
            .unwrap();
        let model = MblModel::train(config, &corpus()).unwrap();
        assert_eq!(model.features().effective_features(), 1);
        // Only feature 0 matters: (A, anything) matches (A,A) and (A,B).
        let c = model.classify(&["A", "Z"]).unwrap();
        assert_eq!(c.predicted, "X");
        assert_relative_eq!(c.distance, 0.0);
        assert_eq!(c.distribution.frequency(0), 2);
    }

    #[test]
    fn classify_batch_matches_sequential_classification() {
        let model = MblModel::train(overlap_config(3), &corpus()).unwrap();
        let queries: Vec<Vec<String>> = vec![
            vec!["A".into(), "A".into()],
            vec!["B".into(), "B".into()],
            vec!["A".into(), "B".into()],
        ];
        let batch = model.classify_batch(&queries);
        for (q, result) in queries.iter().zip(&batch) {
            let single = model.classify(q).unwrap();
            let batched = result.as_ref().unwrap();
            assert_eq!(single.predicted, batched.predicted);
            assert_relative_eq!(single.distance, batched.distance);
        }
    }

    #[test]
    fn evaluate_counts_correct_predictions() {
        let model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        let stats = model.evaluate(&corpus());
        assert_eq!(stats.data_lines(), 3);
        assert_eq!(stats.tested_correct(), 3);
        assert_eq!(stats.exact_matches(), 3);
        assert_relative_eq!(stats.accuracy(), 1.0);
    }

    #[test]
    fn deterministic_given_identical_inputs() {
        let a = MblModel::train(overlap_config(3), &corpus()).unwrap();
        let b = MblModel::train(overlap_config(3), &corpus()).unwrap();
        for query in [["A", "A"], ["B", "B"], ["A", "B"]] {
            let ca = a.classify(&query).unwrap();
            let cb = b.classify(&query).unwrap();
            assert_eq!(ca.predicted, cb.predicted);
            assert_eq!(ca.distribution, cb.distribution);
            assert_relative_eq!(ca.distance, cb.distance);
        }
    }

    #[test]
    fn neighbor_report_is_returned_when_requested() {
        let config = MblConfig::builder()
            .weighting(WeightKind::NoWeight)
            .num_neighbors(2)
            .store_neighbors(true)
            .show_distance(true)
            .show_distribution(true)
            .build()
            .unwrap();
        let model = MblModel::train(config, &corpus()).unwrap();
        let c = model.classify(&["A", "A"]).unwrap();
        let ns = c.neighbors.unwrap();
        assert_eq!(ns.len(), 2);
        assert_eq!(ns.get(0).unwrap().labels, vec!["A A"]);
        assert_eq!(ns.get(1).unwrap().total, 2);
        let xml = ns.to_xml(model.targets(), model.interner());
        assert!(xml.starts_with("<neighborset>"));
        assert!(xml.contains("<instance>A A</instance>"));
    }

    #[test]
    fn query_time_options_stay_live_after_training() {
        let mut model = MblModel::train(overlap_config(1), &corpus()).unwrap();
        use crate::model::config::SetStatus;
        assert_eq!(model.options_mut().set("k", "3"), SetStatus::Ok);
        assert_eq!(model.options_mut().set("metric", "value_diff"), SetStatus::Frozen);
        let c = model.classify(&["A", "A"]).unwrap();
        // k=3 now merges the distance-1 bucket into the vote.
        assert_eq!(c.distribution.total_items(), 3);
    }
}
