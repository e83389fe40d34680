use criterion::{criterion_group, criterion_main, Criterion};
use cpu_engine::CpuEngine;
use simcore::types::Operation;
use simcore::Engine;

fn process_operation_bench(c: &mut Criterion) {
    let mut engine = CpuEngine::new(64);
    let mut tick = 0u64;
    c.bench_function("cpu_engine::process_operation", |b| {
        b.iter(|| {
            tick += 1;
            engine.process_operation(Operation::new("bench-op", "cpu_compute", 4096, tick), tick)
        })
    });
}

fn process_tick_bench(c: &mut Criterion) {
    let mut engine = CpuEngine::new(64);
    for i in 0..64 {
        engine.queue_operation(Operation::new(format!("op{i}"), "cpu_compute", 2048, 0)).unwrap();
    }
    let mut tick = 0u64;
    c.bench_function("cpu_engine::process_tick", |b| {
        b.iter(|| {
            tick += 1;
            engine.process_tick(tick)
        })
    });
}

criterion_group!(benches, process_operation_bench, process_tick_bench);
criterion_main!(benches);
