//! Model persistence.
//!
//! A trained model serializes to a version-tagged JSON payload and loads
//! back into an equivalent frozen model. Two equivalent forms exist,
//! selected by the caller: distributions keyed by dense target index
//! (`hashed = false`) or by interned name id (`hashed = true`). Loading
//! re-parses distributions against the reconstructed target registry;
//! references to unknown targets either allocate placeholders on demand or
//! fail, per the `create_missing` flag.

pub mod payload;

use std::io::{Read, Write};

use crate::data::distribution::{ClassDistribution, DistParseError};
use crate::data::feature::FeatureError;
use crate::data::features::FeatureSet;
use crate::data::matrix::SymmetricMatrix;
use crate::data::targets::Targets;
use crate::interner::StringInterner;
use crate::model::config::OptionTable;
use crate::model::learner::{Exemplar, MblModel};

pub use payload::{
    ExemplarPayload, FeaturePayload, MatrixPayload, ModelPayload, ModelPayloadV1, TargetPayload,
    ValuePayload,
};

/// Serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The payload failed to encode.
    #[error("model serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deserialization errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The payload failed to decode.
    #[error("model deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A distribution text failed to parse or referenced an unknown target.
    #[error(transparent)]
    Dist(#[from] DistParseError),

    /// A matrix did not match its feature's value table.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// The payload contradicts itself.
    #[error("payload is structurally inconsistent: {0}")]
    Corrupt(String),
}

/// Snapshot a trained model into its payload form.
pub fn to_payload(model: &MblModel, hashed: bool) -> ModelPayload {
    let targets = model.targets();
    let render = |dist: &ClassDistribution| {
        if hashed {
            dist.save_hashed(targets)
        } else {
            dist.save()
        }
    };

    let target_payloads = targets
        .iter()
        .map(|tv| TargetPayload {
            name_id: tv.name_id(),
            frequency: tv.frequency(),
        })
        .collect();

    let feature_payloads = model
        .features()
        .iter()
        .map(|feat| FeaturePayload {
            ignore: feat.ignored(),
            numeric: feat.is_numeric(),
            metric_override: feat.metric_override(),
            weight: feat.weight(),
            entropy: feat.entropy(),
            info_gain: feat.info_gain(),
            split_info: feat.split_info(),
            gain_ratio: feat.gain_ratio(),
            chi_square: feat.chi_square(),
            shared_variance: feat.shared_variance(),
            standard_deviation: feat.standard_deviation(),
            n_min: feat.n_min(),
            n_max: feat.n_max(),
            matrix_clip_freq: feat.matrix_clip_freq(),
            values: feat
                .iter_values()
                .map(|fv| ValuePayload {
                    name_id: fv.name_id(),
                    frequency: fv.frequency(),
                    numeric: fv.numeric(),
                    dist: render(fv.target_dist()),
                })
                .collect(),
            matrix: feat.matrix().map(|m| MatrixPayload {
                size: m.size(),
                cells: m.cells().to_vec(),
            }),
        })
        .collect();

    let exemplar_payloads = model
        .exemplars()
        .iter()
        .map(|ex| ExemplarPayload {
            values: ex.values().to_vec(),
            dist: render(ex.dist()),
        })
        .collect();

    ModelPayload::V1(ModelPayloadV1 {
        options: model.options().config().clone(),
        hashed,
        strings: model.interner().iter().map(str::to_owned).collect(),
        targets: target_payloads,
        features: feature_payloads,
        exemplars: exemplar_payloads,
        target_entropy: model.target_entropy(),
        n_instances: model.n_instances(),
    })
}

/// Reassemble a model from its payload form.
pub fn from_payload(payload: ModelPayload, create_missing: bool) -> Result<MblModel, LoadError> {
    let ModelPayload::V1(p) = payload;

    p.options
        .validate()
        .map_err(|e| LoadError::Corrupt(e.to_string()))?;

    let mut interner = StringInterner::new();
    for s in &p.strings {
        interner.intern(s);
    }

    let mut targets = Targets::new();
    for t in &p.targets {
        if t.name_id == 0 {
            targets.add_placeholder();
        } else {
            targets.add_value(t.name_id, t.frequency);
        }
    }

    let parse = |text: &str, targets: &mut Targets| -> Result<ClassDistribution, DistParseError> {
        if p.hashed {
            ClassDistribution::read_hashed(text, targets, create_missing)
        } else {
            ClassDistribution::read(text, targets, create_missing)
        }
    };

    let mut features = FeatureSet::new(p.features.len());
    for (fi, fp) in p.features.iter().enumerate() {
        let feat = &mut features[fi];
        feat.set_ignored(fp.ignore);
        feat.set_numeric(fp.numeric);
        feat.set_metric_override(fp.metric_override);
        feat.set_matrix_clip_freq(fp.matrix_clip_freq);
        feat.set_numeric_range(fp.n_min, fp.n_max);
        feat.restore_stats(
            fp.entropy,
            fp.info_gain,
            fp.split_info,
            fp.gain_ratio,
            fp.chi_square,
            fp.shared_variance,
            fp.standard_deviation,
        );
        feat.set_weight(fp.weight);
        for vp in &fp.values {
            let dist = parse(&vp.dist, &mut targets)?;
            if dist.total_items() != vp.frequency {
                return Err(LoadError::Corrupt(format!(
                    "feature {fi}: value frequency {} does not match its distribution total {}",
                    vp.frequency,
                    dist.total_items()
                )));
            }
            feat.restore_value(vp.name_id, vp.frequency, vp.numeric, dist);
        }
        if let Some(mp) = &fp.matrix {
            let matrix = SymmetricMatrix::from_cells(mp.size, mp.cells.clone())
                .ok_or_else(|| {
                    LoadError::Corrupt(format!("feature {fi}: matrix cell count mismatch"))
                })?;
            feat.set_matrix(matrix)?;
        }
    }
    features.calculate_permutation();

    let mut exemplars = Vec::with_capacity(p.exemplars.len());
    for ep in &p.exemplars {
        if ep.values.len() != p.features.len() {
            return Err(LoadError::Corrupt(format!(
                "exemplar arity {} does not match feature count {}",
                ep.values.len(),
                p.features.len()
            )));
        }
        let dist = parse(&ep.dist, &mut targets)?;
        exemplars.push(Exemplar::from_parts(ep.values.clone(), dist));
    }

    Ok(MblModel::from_parts(
        interner,
        targets,
        features,
        exemplars,
        OptionTable::frozen(p.options),
        p.target_entropy,
        p.n_instances,
    ))
}

/// Serialize a trained model as JSON.
pub fn save_model(model: &MblModel, writer: impl Write, hashed: bool) -> Result<(), SaveError> {
    let payload = to_payload(model, hashed);
    serde_json::to_writer(writer, &payload)?;
    Ok(())
}

/// Deserialize a model from JSON.
pub fn load_model(reader: impl Read, create_missing: bool) -> Result<MblModel, LoadError> {
    let payload: ModelPayload = serde_json::from_reader(reader)?;
    from_payload(payload, create_missing)
}
