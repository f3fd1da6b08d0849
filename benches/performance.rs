use criterion::{criterion_group, criterion_main, Criterion};
use lazyflow::ops::{self, Carry, SplitOptions};
use lazyflow::{pipe, Nested, Seq};

fn make_source(rows: usize) -> Seq<u64> {
    Seq::from_values((0..rows as u64).collect::<Vec<_>>())
}

fn make_nested(rows: usize) -> Seq<Nested<u64>> {
    let groups: Vec<Nested<u64>> = (0..rows as u64)
        .collect::<Vec<_>>()
        .chunks(16)
        .map(|chunk| Nested::list(chunk.iter().copied().map(Nested::Value).collect()))
        .collect();
    Seq::from_values(groups)
}

fn bench_map_filter(c: &mut Criterion) {
    let p = lazyflow::pipe!(
        make_source(4096),
        ops::filter(|v: &u64, _, _| v % 3 != 0),
        ops::map(|v: u64, i, _| v * 2 + i as u64),
        ops::count(),
    );
    c.bench_function("map_filter_count", |b| {
        b.iter(|| {
            let _ = p.collect().unwrap();
        })
    });
}

fn bench_split(c: &mut Criterion) {
    let opts = SplitOptions {
        carry_end: Carry::Back,
        ..SplitOptions::default()
    };
    let p = pipe(make_source(4096)).then(ops::split_with(|v: &u64, _, _| v % 64 == 63, opts));
    c.bench_function("split_windows", |b| {
        b.iter(|| {
            let _ = p.collect().unwrap();
        })
    });
}

fn bench_flat(c: &mut Criterion) {
    let p = pipe(make_nested(4096)).then(ops::flat(1));
    c.bench_function("flat_depth_one", |b| {
        b.iter(|| {
            let _ = p.collect().unwrap();
        })
    });
}

criterion_group!(pipelines, bench_map_filter, bench_split, bench_flat);
criterion_main!(pipelines);
