//! Shared fixtures for unit and integration tests.
//!
//! Small, hand-checkable datasets whose statistics and neighbor structure
//! are easy to verify on paper.

use crate::data::instance::Dataset;

/// The three-instance corpus over two symbolic features used by the search
/// and voting tests: `(A,A)->X`, `(A,B)->X`, `(B,A)->Y`.
pub fn tiny_corpus() -> Dataset {
    Dataset::from_rows([
        (["A", "A"], "X"),
        (["A", "B"], "X"),
        (["B", "A"], "Y"),
    ])
    .expect("consistent arity")
}

/// The classic play-tennis corpus: four symbolic features
/// (outlook, temperature, humidity, wind) over the targets yes/no.
pub fn weather_corpus() -> Dataset {
    let rows: [([&str; 4], &str); 14] = [
        (["sunny", "hot", "high", "weak"], "no"),
        (["sunny", "hot", "high", "strong"], "no"),
        (["overcast", "hot", "high", "weak"], "yes"),
        (["rain", "mild", "high", "weak"], "yes"),
        (["rain", "cool", "normal", "weak"], "yes"),
        (["rain", "cool", "normal", "strong"], "no"),
        (["overcast", "cool", "normal", "strong"], "yes"),
        (["sunny", "mild", "high", "weak"], "no"),
        (["sunny", "cool", "normal", "weak"], "yes"),
        (["rain", "mild", "normal", "weak"], "yes"),
        (["sunny", "mild", "normal", "strong"], "yes"),
        (["overcast", "mild", "high", "strong"], "yes"),
        (["overcast", "hot", "normal", "weak"], "yes"),
        (["rain", "mild", "high", "strong"], "no"),
    ];
    Dataset::from_rows(rows).expect("consistent arity")
}

/// A numeric single-feature corpus over `[0, 10]` with the class flipping
/// at 5.
pub fn numeric_corpus() -> Dataset {
    let rows: Vec<(Vec<String>, String)> = (0..=10)
        .map(|v| {
            let label = if v < 5 { "low" } else { "high" };
            (vec![v.to_string()], label.to_string())
        })
        .collect();
    Dataset::from_rows(rows).expect("consistent arity")
}
