use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{ArrayD, IxDyn};

use rtorch_optim::optim::{Adam, Momentum, Optimizer, ParamGroup, SGD};
use rtorch_optim::tensor::Tensor;

const LAYERS: usize = 8;

fn layers(size: usize) -> Vec<Tensor> {
    (0..LAYERS)
        .map(|i| {
            let t = Tensor::new(ArrayD::from_elem(IxDyn(&[size]), 1.0));
            t.set_grad(ArrayD::from_elem(IxDyn(&[size]), 1e-3 * (i + 1) as f32))
                .expect("gradient shape matches parameter");
            t
        })
        .collect()
}

fn bench_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for size in [1_000usize, 100_000] {
        let mut sgd = Optimizer::new([ParamGroup::new(layers(size), 1e-3)], SGD).unwrap();
        group.bench_with_input(BenchmarkId::new("sgd", size), &size, |b, _| {
            b.iter(|| sgd.step().unwrap())
        });

        let mut momentum =
            Optimizer::new([ParamGroup::new(layers(size), 1e-3)], Momentum::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("momentum", size), &size, |b, _| {
            b.iter(|| momentum.step().unwrap())
        });

        let mut adam =
            Optimizer::new([ParamGroup::new(layers(size), 1e-3)], Adam::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("adam", size), &size, |b, _| {
            b.iter(|| adam.step().unwrap())
        });

        let mut par_adam =
            Optimizer::new([ParamGroup::new(layers(size), 1e-3)], Adam::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("adam_parallel", size), &size, |b, _| {
            b.iter(|| par_adam.par_step().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rules);
criterion_main!(benches);
