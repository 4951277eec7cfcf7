//! Journal throughput: recording a busy frame's events and closing it.
//!
//! Run with: `cargo bench --bench journal_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use floe_journal::prelude::*;
use floe_world::prelude::*;

fn record_and_close(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_frame");
    for events_per_frame in [10usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(events_per_frame),
            &events_per_frame,
            |b, &n| {
                let mut journal = EventJournal::new();
                let mut frame = 0u64;
                b.iter(|| {
                    frame += 1;
                    journal.begin_frame(frame);
                    for i in 0..n {
                        let id = EntityId::new(i as u32, 0);
                        journal.record(
                            GameEvent::new(
                                EventKind::HpChanged { entity: id, hp: 3 },
                                SystemId::INTERACTION,
                                CausalReason::Contact(id, id),
                            )
                            .involving([id]),
                        );
                    }
                    black_box(journal.end_frame());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, record_and_close);
criterion_main!(benches);
