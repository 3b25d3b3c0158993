use criterion::{Criterion, black_box, criterion_group, criterion_main};
use latprobe::scenario::{Scenario, ScenarioConfig};
use latprobe_core::measure::PacketLoss;

fn run(config: &ScenarioConfig) -> usize {
    let mut scenario = Scenario::build(config).unwrap();
    scenario.run();
    scenario.recorder().map_or(0, |recorder| recorder.len())
}

fn reference_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario");

    let reference = ScenarioConfig::default();
    group.bench_function("reference", |b| b.iter(|| black_box(run(&reference))));

    let dense = ScenarioConfig {
        rate: 10_000.0,
        ..ScenarioConfig::default()
    };
    group.bench_function("10k units per second", |b| {
        b.iter(|| black_box(run(&dense)))
    });

    let lossy = ScenarioConfig {
        packet_loss: PacketLoss::rate(0.05).unwrap(),
        ..ScenarioConfig::default()
    };
    group.bench_function("5% loss", |b| b.iter(|| black_box(run(&lossy))));

    group.finish();
}

criterion_group!(benches, reference_run);
criterion_main!(benches);
