use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use fidelity_core::{ArParams, Environment, Factors, ProbabilityPolicy, init_population, run};
use rand::{SeedableRng, rngs::SmallRng};

fn bench_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    let generations: usize = std::env::var("FIDELITY_BENCH_GENERATIONS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(50);
    let factors = Factors {
        reproduction: ProbabilityPolicy::Fixed(0.66),
        selection: ProbabilityPolicy::Fixed(0.66),
        max_offspring: 5,
        ..Factors::default()
    };
    for &population in &[500_usize, 5_000] {
        group.bench_function(format!("gens{generations}_pop{population}"), |b| {
            b.iter_batched(
                || {
                    let mut rng = SmallRng::seed_from_u64(0xBEEF);
                    let founders = init_population(population, &mut rng).expect("founders");
                    let environment = Environment::generate(
                        ArParams::new(0.1, 0.05, 0.0),
                        false,
                        population,
                        generations,
                        &mut rng,
                    )
                    .expect("environment");
                    (founders, environment, rng)
                },
                |(founders, environment, mut rng)| {
                    run(factors, founders, generations, 10, &environment, &mut rng)
                        .expect("run")
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_runs);
criterion_main!(benches);
