//! Prediction throughput: batch size, model size, threading and block size.

use std::time::Duration;

use symtree::inference::Predictor;
use symtree::testing::{random_model, random_rows, RandomModelSpec};
use symtree::{run_with_threads, Parallelism};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn default_criterion() -> Criterion {
	Criterion::default()
		.warm_up_time(Duration::from_secs(1))
		.measurement_time(Duration::from_secs(3))
		.sample_size(30)
}

fn bench_batch_sizes(c: &mut Criterion) {
	let model = random_model(RandomModelSpec::default(), 42);
	let predictor = Predictor::new(&model);

	let mut group = c.benchmark_group("predict/batch_size");

	for batch_size in [1usize, 10, 100, 1_000, 10_000] {
		let (numeric, tokens) = random_rows(&model, batch_size, 7);

		group.throughput(Throughput::Elements(batch_size as u64));
		group.bench_with_input(BenchmarkId::new("medium", batch_size), &(numeric, tokens), |b, (numeric, tokens)| {
			b.iter(|| {
				let output = predictor.predict(black_box(numeric.view()), black_box(tokens.view()), Parallelism::Sequential);
				black_box(output)
			});
		});
	}

	group.finish();
}

fn bench_model_sizes(c: &mut Criterion) {
	let specs = [
		("small", RandomModelSpec { n_trees: 10, depth: 4, ..Default::default() }),
		("medium", RandomModelSpec::default()),
		("large", RandomModelSpec { n_trees: 500, depth: 8, n_numeric: 32, n_categorical: 8, ..Default::default() }),
		("multiclass", RandomModelSpec { n_trees: 300, n_outputs: 5, ..Default::default() }),
	];
	let batch_size = 1_000usize;

	let mut group = c.benchmark_group("predict/model_size");

	for (label, spec) in specs {
		let model = random_model(spec, 42);
		let predictor = Predictor::new(&model);
		let (numeric, tokens) = random_rows(&model, batch_size, 7);

		group.throughput(Throughput::Elements(batch_size as u64));
		group.bench_function(BenchmarkId::new(label, batch_size), |b| {
			b.iter(|| {
				let output = predictor.predict(black_box(numeric.view()), black_box(tokens.view()), Parallelism::Sequential);
				black_box(output)
			});
		});
	}

	group.finish();
}

fn bench_threads(c: &mut Criterion) {
	let model = random_model(RandomModelSpec { n_trees: 200, ..Default::default() }, 42);
	let predictor = Predictor::new(&model);
	let batch_size = 20_000usize;
	let (numeric, tokens) = random_rows(&model, batch_size, 7);

	let mut group = c.benchmark_group("predict/threads");
	group.throughput(Throughput::Elements(batch_size as u64));

	for n_threads in [1usize, 2, 4, 8] {
		group.bench_function(BenchmarkId::from_parameter(n_threads), |b| {
			b.iter(|| {
				let output = run_with_threads(n_threads, |parallelism| {
					predictor.predict(black_box(numeric.view()), black_box(tokens.view()), parallelism)
				});
				black_box(output)
			});
		});
	}

	group.finish();
}

fn bench_block_sizes(c: &mut Criterion) {
	let model = random_model(RandomModelSpec::default(), 42);
	let batch_size = 10_000usize;
	let (numeric, tokens) = random_rows(&model, batch_size, 7);

	let mut group = c.benchmark_group("predict/block_size");
	group.throughput(Throughput::Elements(batch_size as u64));

	for block_size in [16usize, 64, 256, 1024] {
		let predictor = Predictor::new(&model).with_block_size(block_size);
		group.bench_function(BenchmarkId::from_parameter(block_size), |b| {
			b.iter(|| {
				let output = predictor.predict(black_box(numeric.view()), black_box(tokens.view()), Parallelism::Sequential);
				black_box(output)
			});
		});
	}

	group.finish();
}

criterion_group! {
	name = benches;
	config = default_criterion();
	targets = bench_batch_sizes, bench_model_sizes, bench_threads, bench_block_sizes
}
criterion_main!(benches);
