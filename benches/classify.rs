//! Classification benchmarks.
//!
//! Benchmarks for the k-NN classify pipeline:
//! - exemplar count scaling (exhaustive search with early termination)
//! - k and decay configurations
//! - sequential vs parallel batch classification

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mblearn::{Dataset, Decay, MblConfig, MblModel, Sample, WeightKind};

// =============================================================================
// Synthetic data
// =============================================================================

/// Deterministic symbolic dataset: `n_features` columns with `vocab` values
/// each, labels derived from the first two columns.
fn generate_dataset(n_rows: usize, n_features: usize, vocab: usize) -> Dataset {
    let mut ds = Dataset::new();
    let mut state = 0x9e3779b97f4a7c15u64;
    for _ in 0..n_rows {
        let mut values = Vec::with_capacity(n_features);
        for _ in 0..n_features {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            values.push(format!("v{}", (state >> 33) as usize % vocab));
        }
        let label = if values[0] < values[1] { "lt" } else { "ge" };
        ds.push(Sample::new(values, label)).expect("consistent arity");
    }
    ds
}

fn queries_from(ds: &Dataset, n: usize) -> Vec<Vec<String>> {
    ds.samples()
        .iter()
        .take(n)
        .map(|s| s.values.clone())
        .collect()
}

// =============================================================================
// Exemplar count scaling
// =============================================================================

fn bench_exemplar_scaling(c: &mut Criterion) {
    let n_features = 10;
    let mut group = c.benchmark_group("classify/exemplars");

    for n_rows in [1_000, 10_000] {
        let ds = generate_dataset(n_rows, n_features, 20);
        let model = MblModel::train(MblConfig::default(), &ds).expect("training succeeds");
        let queries = queries_from(&ds, 100);

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("k1", n_rows),
            &(&model, &queries),
            |b, (model, queries)| {
                b.iter(|| {
                    for q in queries.iter() {
                        black_box(model.classify(q).expect("well-formed query"));
                    }
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// k and decay configurations
// =============================================================================

fn bench_k_and_decay(c: &mut Criterion) {
    let ds = generate_dataset(5_000, 10, 20);
    let queries = queries_from(&ds, 100);
    let mut group = c.benchmark_group("classify/k_decay");
    group.throughput(Throughput::Elements(queries.len() as u64));

    for (name, k, decay) in [
        ("k1_zero", 1, Decay::Zero),
        ("k5_zero", 5, Decay::Zero),
        ("k5_inv_dist", 5, Decay::InvDist),
        (
            "k5_exp",
            5,
            Decay::ExpDecay {
                alpha: 1.0,
                beta: 1.0,
            },
        ),
    ] {
        let config = MblConfig::builder()
            .num_neighbors(k)
            .decay(decay)
            .build()
            .expect("valid config");
        let model = MblModel::train(config, &ds).expect("training succeeds");

        group.bench_function(name, |b| {
            b.iter(|| {
                for q in queries.iter() {
                    black_box(model.classify(q).expect("well-formed query"));
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Batch parallelism
// =============================================================================

fn bench_batch_parallelism(c: &mut Criterion) {
    let ds = generate_dataset(10_000, 10, 20);
    let queries = queries_from(&ds, 500);
    let mut group = c.benchmark_group("classify/batch");
    group.throughput(Throughput::Elements(queries.len() as u64));

    for (name, n_threads) in [("sequential", 1), ("parallel", 0)] {
        let config = MblConfig::builder()
            .weighting(WeightKind::GainRatio)
            .n_threads(n_threads)
            .build()
            .expect("valid config");
        let model = MblModel::train(config, &ds).expect("training succeeds");

        group.bench_function(name, |b| {
            b.iter(|| black_box(model.classify_batch(&queries)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_exemplar_scaling,
    bench_k_and_decay,
    bench_batch_parallelism
);
criterion_main!(benches);
