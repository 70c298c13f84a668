use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pairbai::{
    BestArmPolicy, CovarianceModel, GaussianSource, SuccessiveRejects, UniformAllocator,
};
use std::hint::black_box;

fn ex0() -> CovarianceModel {
    CovarianceModel::new(vec![
        vec![1.0, 0.6, 0.2, 0.1],
        vec![0.6, 1.0, 0.1, 0.1],
        vec![0.2, 0.1, 1.0, 0.0],
        vec![0.1, 0.1, 0.0, 1.0],
    ])
    .unwrap()
}

fn bench_policies(c: &mut Criterion) {
    let model = ex0();

    let mut group = c.benchmark_group("identify");
    for &budget in &[1_000u64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("uniform", budget), &budget, |b, &budget| {
            let mut seed = 0u64;
            b.iter(|| {
                seed += 1;
                let mut src = GaussianSource::with_seed(model.clone(), seed);
                black_box(UniformAllocator.identify(&mut src, budget).unwrap().best_arm)
            })
        });
        group.bench_with_input(
            BenchmarkId::new("successive_rejects", budget),
            &budget,
            |b, &budget| {
                let mut seed = 0u64;
                b.iter(|| {
                    seed += 1;
                    let mut src = GaussianSource::with_seed(model.clone(), seed);
                    black_box(SuccessiveRejects.identify(&mut src, budget).unwrap().best_arm)
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_policies);
criterion_main!(benches);
