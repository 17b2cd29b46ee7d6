use criterion::{criterion_group, criterion_main, Criterion};
use contagion::parameters::{Parameters, StrategyCode, Topology};
use contagion::simulation::run_episode;

static SEED: u64 = 123;

fn episode(strategy: StrategyCode) -> Parameters {
    Parameters {
        strategy,
        population: 1000,
        iterations: 50,
        p_init_sick: 0.01,
        test_capacity: 100,
        topology: Topology::Random { mean_degree: 20.0 },
        ..Parameters::default()
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for strategy in [StrategyCode::B, StrategyCode::D, StrategyCode::H] {
        let parameters = episode(strategy);
        c.bench_function(&format!("episode strategy {strategy}"), |bencher| {
            bencher.iter_with_large_drop(|| run_episode(&parameters, SEED));
        });
    }
}

criterion_group!(episode_benches, criterion_benchmark);
criterion_main!(episode_benches);
