use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use latprobe_core::{network::Network, scheduler::Scheduler, time::SimTime};

fn bench_schedule_pop(group: &mut BenchmarkGroup<'_, WallTime>, size: u64) {
    group.throughput(Throughput::Elements(size));
    group.bench_function(format!("{size} events"), |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::new();
            // interleave times so the heap actually has to sort
            for i in 0..size {
                let time = SimTime::from_nanos((i * 7_919) % size);
                scheduler.schedule_at(time, i);
            }
            while let Some(event) = scheduler.pop() {
                black_box(event);
            }
        })
    });
}

fn scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");
    for size in [100, 10_000, 100_000] {
        bench_schedule_pop(&mut group, size);
    }
    group.finish();
}

fn transmit(c: &mut Criterion) {
    let mut network = Network::new();
    let node1 = network.new_node();
    let node2 = network.new_node();
    network.configure_link(node1, node2).apply();

    let mut now = SimTime::ZERO;
    c.bench_function("transmit", |b| {
        b.iter(|| {
            now = now + std::time::Duration::from_micros(100);
            network
                .transmit(node1, node2, black_box(142), now)
                .unwrap()
        })
    });
}

criterion_group!(benches, scheduler, transmit);
criterion_main!(benches);
