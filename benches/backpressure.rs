use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mailbox_source::{OverflowPolicy, SourceBuilder};
use std::time::Duration;

fn benchmark_backpressure_slow_consumer(c: &mut Criterion) {
    c.bench_function("backpressure_slow_consumer_1000_msgs", |b| {
        b.iter(|| {
            let (endpoint, mut pump) = SourceBuilder::new()
                .capacity(100)
                .overflow_policy(OverflowPolicy::Backpressure)
                .initial_credit(100)
                .build(Vec::with_capacity(1000))
                .expect("Build failed");

            // Slow consumer: one element every few microseconds
            let consumer = std::thread::spawn(move || {
                while !pump.request(1).is_terminal() {
                    std::thread::sleep(Duration::from_micros(5));
                }
                pump.into_sink()
            });

            for i in 0..1000 {
                let _ = endpoint.send(black_box(vec![i as u8; 64]));
            }

            drop(endpoint);
            let _ = consumer.join();
        });
    });
}

fn benchmark_single_credit_ack_round_trip(c: &mut Criterion) {
    c.bench_function("single_credit_ack_round_trip_1000_msgs", |b| {
        b.iter(|| {
            let (endpoint, pump) = SourceBuilder::new()
                .capacity(1)
                .overflow_policy(OverflowPolicy::Backpressure)
                .initial_credit(1)
                .build(Vec::with_capacity(1000))
                .expect("Build failed");

            let running = pump.spawn();

            for i in 0..1000u32 {
                let _ = endpoint.send(black_box(i));
            }

            drop(endpoint);
            let _ = running.join();
        });
    });
}

fn benchmark_drop_policy_high_load(c: &mut Criterion) {
    c.bench_function("drop_oldest_high_load_2000_msgs", |b| {
        b.iter(|| {
            let (endpoint, mut pump) = SourceBuilder::new()
                .capacity(200)
                .overflow_policy(OverflowPolicy::DropOldest)
                .build(Vec::with_capacity(200))
                .expect("Build failed");

            for i in 0..2000 {
                let _ = endpoint.send(black_box(vec![i as u8; 64]));
                if i % 10 == 0 {
                    pump.try_request(1);
                }
            }

            endpoint.complete().expect("Complete failed");
            pump.run();
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(15))
        .sample_size(20);
    targets = benchmark_backpressure_slow_consumer, benchmark_single_credit_ack_round_trip, benchmark_drop_policy_high_load
);
criterion_main!(benches);
