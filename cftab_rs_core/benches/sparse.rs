use cftab_core::{Base, MergeOptions, MergePolicy};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{
    rngs::StdRng,
    seq::{index::sample, SliceRandom},
    Rng, SeedableRng,
};

/// a sparse `n x n` object holding `per_point` scattered values in every point
fn random_triplets(n: usize, per_point: usize, seed: u64) -> Base<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut row = Vec::with_capacity(n * per_point);
    let mut col = Vec::with_capacity(n * per_point);
    for r in 0..n {
        for c in sample(&mut rng, n, per_point) {
            row.push(r);
            col.push(c);
        }
    }
    let data = (0..row.len()).map(|_| rng.gen_range(1.0..100.0)).collect();
    Base::from_triplets((n, n), data, row, col).unwrap()
}

/// `n` points keyed `0..n` in shuffled order, plus one value feature
fn keyed(n: usize, seed: u64) -> Base<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys: Vec<usize> = (0..n).collect();
    keys.shuffle(&mut rng);
    let rows = keys
        .into_iter()
        .map(|k| vec![k as f64, rng.gen_range(1.0..100.0)])
        .collect();
    Base::from_rows(rows, cftab_core::BackendKind::Sparse)
        .unwrap()
        .with_feature_names(vec!["key".to_string(), format!("v{seed}")])
        .unwrap()
}

macro_rules! bench_access {
    ($c:expr, $n:expr) => {{
        let base = random_triplets($n, 8, 239);
        let name = format!("sparse get (n={})", $n);
        $c.bench_function(&name, |b| {
            b.iter(|| {
                (0..$n)
                    .map(|i| base.get(black_box(i), black_box(($n - 1) - i)).unwrap())
                    .sum::<f64>()
            })
        });
        let name = format!("sparse transpose (n={})", $n);
        $c.bench_function(&name, |b| {
            b.iter(|| {
                let mut base = base.copy();
                base.transpose()
            })
        });
    }};
}

macro_rules! bench_merge {
    ($c:expr, $n:expr) => {{
        let left = keyed($n, 1);
        let right = keyed($n, 2);
        let name = format!("sparse merge on feature (n={})", $n);
        $c.bench_function(&name, |b| {
            b.iter(|| {
                let mut merged = left.copy();
                let options =
                    MergeOptions::new(MergePolicy::Union, MergePolicy::Union).on_feature("key");
                merged.merge(black_box(&right), options)
            })
        });
    }};
}

pub fn bench_sparse(c: &mut Criterion) {
    bench_access!(c, 1000);
    bench_access!(c, 10000);
    bench_merge!(c, 1000);
    bench_merge!(c, 10000);
}

criterion_group!(benches, bench_sparse);
criterion_main!(benches);
