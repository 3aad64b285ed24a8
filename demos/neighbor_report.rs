//! Neighbor-set reporting example.
//!
//! Classifies a query with neighbor retention on and prints the k-best
//! buckets plus the XML surface form consumed by external tooling.
//!
//! Run with:
//! ```bash
//! cargo run --example neighbor_report
//! ```

use mblearn::testing::weather_corpus;
use mblearn::{MblConfig, MblModel};

fn main() {
    let config = MblConfig::builder()
        .num_neighbors(3)
        .store_neighbors(true)
        .show_distance(true)
        .show_distribution(true)
        .build()
        .expect("valid config");

    let model = MblModel::train(config, &weather_corpus()).expect("training succeeds");

    let query = ["sunny", "cool", "high", "strong"];
    let result = model.classify(&query).expect("well-formed query");
    println!("{:?} -> {}", query, result.predicted);

    let neighbors = result.neighbors.expect("store_neighbors is on");
    for (rank, n) in neighbors.iter().enumerate() {
        println!(
            "k={} distance={:.4} total={}",
            rank + 1,
            n.distance,
            n.total
        );
        for label in &n.labels {
            println!("    {label}");
        }
    }

    println!();
    println!("{}", neighbors.to_xml(model.targets(), model.interner()));
}
