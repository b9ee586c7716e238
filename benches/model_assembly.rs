//! Benchmarks for scenario resolution, model assembly and solving
//!
//! Assembly is measured on a few representative scenarios of the reference network;
//! solving is measured on the reference scenario only.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use supplynet::lp_model_builder;
use supplynet::model::NetworkModel;
use supplynet::scenario::{Events, ScenarioRequest};
use supplynet::solve::solve_scenario;

/// Scenarios available for benchmarking
fn scenarios() -> Vec<(&'static str, ScenarioRequest)> {
    vec![
        ("reference", ScenarioRequest::reference()),
        (
            "suez_oil_crisis",
            ScenarioRequest {
                events: Events {
                    suez_canal: true,
                    oil_crisis: true,
                    ..Events::default()
                },
                ..ScenarioRequest::reference()
            },
        ),
        (
            "no_new_locations",
            ScenarioRequest {
                use_new_locations: Some(false),
                ..ScenarioRequest::reference()
            }
            .with_unmet_demand(),
        ),
    ]
}

/// Benchmark resolution of requests against the reference network
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for (name, request) in scenarios() {
        group.bench_with_input(BenchmarkId::new("resolve", name), &request, |b, request| {
            b.iter(|| black_box(black_box(request).resolve()))
        });
    }

    group.finish();
}

/// Benchmark MILP assembly
fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembly");

    for (name, request) in scenarios() {
        let scenario = match request.resolve() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Warning: Could not resolve {}: {}. Skipping benchmark.", name, e);
                continue;
            }
        };

        // Count variables for throughput measurement
        let variables = NetworkModel::assemble(&scenario, lp_model_builder!())
            .builder
            .num_variables();
        group.throughput(Throughput::Elements(variables as u64));

        group.bench_with_input(BenchmarkId::new("assemble", name), &scenario, |b, scenario| {
            b.iter(|| {
                let model = NetworkModel::assemble(black_box(scenario), lp_model_builder!());
                black_box(model.builder.num_constraints())
            })
        });
    }

    group.finish();
}

/// Benchmark a complete solve of the reference scenario
fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.sample_size(10);

    let scenario = match ScenarioRequest::reference().resolve() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Warning: Could not resolve the reference scenario: {}", e);
            return;
        }
    };

    group.bench_function("reference", |b| {
        b.iter(|| black_box(solve_scenario(black_box(&scenario)).is_optimal()))
    });

    group.finish();
}

criterion_group!(benches, bench_resolution, bench_assembly, bench_solve);
criterion_main!(benches);
