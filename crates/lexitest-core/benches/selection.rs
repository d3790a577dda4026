use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lexitest_core::model::{Question, QuestionKind};
use lexitest_core::pool::{QuestionPool, UsedSet};

fn make_pool(size: usize, levels: u32) -> QuestionPool {
    let questions = (0..size)
        .map(|i| Question {
            id: format!("q{i}"),
            word: format!("word{i}"),
            options: vec![format!("answer{i}"), "other".into()],
            answer: format!("answer{i}"),
            level: (i as u32 % levels) + 1,
            lesson: Some(format!("{}-{}", i % 7, i % 3)),
            kind: QuestionKind::Choice,
        })
        .collect();
    QuestionPool::new(questions)
}

/// Marks every other position used so lookups have to skip.
fn half_used(pool: &QuestionPool) -> UsedSet {
    (0..pool.len()).step_by(2).collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_build");

    for size in [100, 1_000] {
        let questions: Vec<Question> = make_pool(size, 15).iter().cloned().collect();
        group.bench_function(format!("{size}_questions"), |b| {
            b.iter(|| QuestionPool::new(black_box(questions.clone())))
        });
    }

    group.finish();
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");
    let pool = make_pool(1_000, 15);
    let used = half_used(&pool);

    group.bench_function("to_level", |b| {
        b.iter(|| pool.nearest_to_level(black_box(8), black_box(15), black_box(&used)))
    });

    group.bench_function("to_position", |b| {
        b.iter(|| pool.nearest_to_position(black_box(512.5), black_box(&used)))
    });

    group.bench_function("unused_at_level", |b| {
        b.iter(|| pool.unused_at_level(black_box(8), black_box(&used)))
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_nearest);
criterion_main!(benches);
