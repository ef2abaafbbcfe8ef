use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rt_fifo_queue::Queue;
use std::sync::Arc;
use std::thread;

const MESSAGES: u64 = 200_000;

fn bench_single_threaded_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded");
    group.throughput(Throughput::Elements(MESSAGES));

    for capacity in [16usize, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::new("push_pop", capacity),
            &capacity,
            |b, &capacity| {
                let queue = Queue::<u64>::new(capacity);
                b.iter(|| {
                    for i in 0..MESSAGES {
                        queue.push(black_box(i)).unwrap();
                        black_box(queue.pop().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_blocking_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_handoff");
    group.throughput(Throughput::Elements(MESSAGES));

    for capacity in [1usize, 64, 1024] {
        group.bench_with_input(
            BenchmarkId::new("spsc", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(Queue::<u64>::new(capacity));

                    let producer = {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            for i in 0..MESSAGES {
                                queue.push(i).unwrap();
                            }
                        })
                    };

                    let mut received = 0u64;
                    while received < MESSAGES {
                        black_box(queue.pop().unwrap());
                        received += 1;
                    }
                    producer.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_threaded_roundtrip, bench_blocking_handoff);
criterion_main!(benches);
