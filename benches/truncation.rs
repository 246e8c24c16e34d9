use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use error_notifier::{
    ErrorReport, KeyBlacklist, Map, Notice, NoticeSignature, SizeReducer, Truncator, Value,
};

/// Build an object tree `depth` levels deep with `width` fields per level.
fn tree(width: usize, depth: usize) -> Value {
    let node = Value::empty_object();
    for i in 0..width {
        let child = if depth > 1 {
            tree(width, depth - 1)
        } else {
            Value::from(format!("leaf value {}", i))
        };
        node.insert(format!("field{}", i), child);
    }
    node
}

fn large_notice() -> Notice {
    let mut notice = Notice::new(ErrorReport::new("TypeError", "request failed"));
    let mut params = Map::new();
    params.insert("body".to_string(), Value::from("x".repeat(200_000)));
    params.insert(
        "rows".to_string(),
        Value::array((0..2_000).map(|_| tree(4, 2)).collect()),
    );
    params.insert("password".to_string(), Value::from("hunter2"));
    notice.params = params;
    notice
}

/// Benchmark truncating trees of different shapes at the most permissive level
fn bench_truncate_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_tree");
    let blacklist = KeyBlacklist::default();

    for (width, depth) in [(8, 3), (32, 2), (4, 10)] {
        let value = tree(width, depth);
        let truncator = Truncator::new(0, &blacklist);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, depth)),
            &value,
            |b, value| b.iter(|| truncator.truncate(black_box(value))),
        );
    }

    group.finish();
}

/// Benchmark each truncation level against the same wide tree
fn bench_truncate_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_levels");
    let blacklist = KeyBlacklist::default();
    let value = tree(64, 3);

    for level in [0u8, 3, 7] {
        let truncator = Truncator::new(level, &blacklist);
        group.bench_with_input(BenchmarkId::from_parameter(level), &value, |b, value| {
            b.iter(|| truncator.truncate(black_box(value)))
        });
    }

    group.finish();
}

/// Benchmark fitting an oversized notice into the default budget
fn bench_size_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("size_reduction");
    let reducer = SizeReducer::default();
    let notice = large_notice();

    group.throughput(Throughput::Elements(1));
    group.bench_function("oversized_notice", |b| {
        b.iter(|| {
            let mut notice = notice.clone();
            reducer.reduce(black_box(&mut notice))
        })
    });

    group.finish();
}

/// Benchmark notice signature computation used by debouncing
fn bench_signature(c: &mut Criterion) {
    let errors: Vec<ErrorReport> = (0..3)
        .map(|i| ErrorReport::new("TypeError", format!("cause {}", i)))
        .collect();

    c.bench_function("notice_signature", |b| {
        b.iter(|| NoticeSignature::new(black_box(&errors)))
    });
}

criterion_group!(
    benches,
    bench_truncate_tree,
    bench_truncate_levels,
    bench_size_reduction,
    bench_signature
);
criterion_main!(benches);
