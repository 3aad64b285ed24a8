//! Model persistence round-trips.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use approx::assert_relative_eq;

use mblearn::io::{load_model, save_model, to_payload};
use mblearn::testing::{tiny_corpus, weather_corpus};
use mblearn::{MblConfig, MblModel, MetricKind, SetStatus, WeightKind};

fn trained_with_matrix() -> MblModel {
    let config = MblConfig::builder()
        .metric(MetricKind::ValueDiff)
        .matrix_clip_freq(1)
        .num_neighbors(2)
        .build()
        .unwrap();
    MblModel::train(config, &weather_corpus()).unwrap()
}

#[test]
fn file_roundtrip_preserves_predictions() {
    let model = trained_with_matrix();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weather.mbl");

    save_model(&model, BufWriter::new(File::create(&path).unwrap()), false).unwrap();
    let loaded = load_model(BufReader::new(File::open(&path).unwrap()), false).unwrap();

    for sample in weather_corpus().samples() {
        let a = model.classify(&sample.values).unwrap();
        let b = loaded.classify(&sample.values).unwrap();
        assert_eq!(a.predicted, b.predicted);
        assert_eq!(a.distribution, b.distribution);
        assert_relative_eq!(a.distance, b.distance);
    }
}

#[test]
fn hashed_and_named_forms_load_identically() {
    let model = trained_with_matrix();
    let named = serde_json::to_vec(&to_payload(&model, false)).unwrap();
    let hashed = serde_json::to_vec(&to_payload(&model, true)).unwrap();
    let from_named = load_model(named.as_slice(), false).unwrap();
    let from_hashed = load_model(hashed.as_slice(), false).unwrap();
    for sample in weather_corpus().samples() {
        let a = from_named.classify(&sample.values).unwrap();
        let b = from_hashed.classify(&sample.values).unwrap();
        assert_eq!(a.predicted, b.predicted);
        assert_eq!(a.distribution, b.distribution);
    }
}

#[test]
fn reserialization_is_byte_identical() {
    let model = trained_with_matrix();
    let first = serde_json::to_vec(&to_payload(&model, false)).unwrap();
    let loaded = load_model(first.as_slice(), false).unwrap();
    let second = serde_json::to_vec(&to_payload(&loaded, false)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn loaded_model_is_frozen_with_live_query_knobs() {
    let model = MblModel::train(MblConfig::default(), &tiny_corpus()).unwrap();
    let bytes = serde_json::to_vec(&to_payload(&model, false)).unwrap();
    let mut loaded = load_model(bytes.as_slice(), false).unwrap();

    assert!(loaded.options().is_frozen());
    assert_eq!(
        loaded.options_mut().set("metric", "jeffrey"),
        SetStatus::Frozen
    );
    assert_eq!(loaded.options_mut().set("k", "3"), SetStatus::Ok);
    assert!(loaded.classify(&["A", "A"]).is_ok());
}

#[test]
fn matrices_survive_the_roundtrip() {
    let model = trained_with_matrix();
    let bytes = serde_json::to_vec(&to_payload(&model, false)).unwrap();
    let loaded = load_model(bytes.as_slice(), false).unwrap();
    for (orig, back) in model.features().iter().zip(loaded.features().iter()) {
        assert_eq!(orig.matrix_present(), back.matrix_present());
        if let (Some(a), Some(b)) = (orig.matrix(), back.matrix()) {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn weighted_exemplars_survive_the_roundtrip() {
    let mut ds = mblearn::Dataset::new();
    ds.push(mblearn::Sample::new(["A"], "X").with_weight(0.5))
        .unwrap();
    ds.push(mblearn::Sample::new(["A"], "Y").with_weight(4.0))
        .unwrap();
    let config = MblConfig::builder()
        .weighting(WeightKind::NoWeight)
        .build()
        .unwrap();
    let model = MblModel::train(config, &ds).unwrap();
    let bytes = serde_json::to_vec(&to_payload(&model, false)).unwrap();
    let loaded = load_model(bytes.as_slice(), false).unwrap();
    let c = loaded.classify(&["A"]).unwrap();
    // The heavier exemplar still wins after the round-trip.
    assert_eq!(c.predicted, "Y");
}
