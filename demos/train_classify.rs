//! Memory-based classification example.
//!
//! Trains on the play-tennis corpus and classifies a few unseen days,
//! printing the prediction, confidence, and per-feature weights.
//!
//! Run with:
//! ```bash
//! cargo run --example train_classify
//! ```

use mblearn::testing::weather_corpus;
use mblearn::{Decay, MblConfig, MblModel, Verbosity};

fn main() {
    env_logger::init();

    let dataset = weather_corpus();

    let config = MblConfig::builder()
        .num_neighbors(3)
        .decay(Decay::InvDist)
        .verbosity(Verbosity::Info)
        .build()
        .expect("valid config");

    let model = MblModel::train(config, &dataset).expect("training succeeds");

    println!("trained on {} instances", model.n_instances());
    println!("feature weights (gain ratio):");
    for (i, feat) in model.features().iter().enumerate() {
        println!("  feature {}: {:.4}", i + 1, feat.weight());
    }
    println!("search order: {}", model.features().write_permutation());
    println!();

    let queries = [
        ["overcast", "cool", "high", "weak"],
        ["sunny", "hot", "high", "weak"],
        ["rain", "mild", "normal", "strong"],
    ];
    for query in queries {
        let result = model.classify(&query).expect("well-formed query");
        println!(
            "{:?} -> {} (confidence {:.3}, nearest distance {:.4}{})",
            query,
            result.predicted,
            result.confidence(),
            result.distance,
            if result.is_tie { ", tie" } else { "" }
        );
    }

    let stats = model.evaluate(&dataset);
    println!();
    println!(
        "self-test: {}/{} correct ({:.1}%), {} exact matches",
        stats.tested_correct(),
        stats.data_lines(),
        100.0 * stats.accuracy(),
        stats.exact_matches()
    );
}
