//! Benchmarks du décodage et du pivot des prévisions

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mfmap::multiforecast::parse_multiforecast;
use mfmap::{Graphdata, PrevList};

const MULTIFORECAST: &[u8] = include_bytes!("../tests/fixtures/multiforecast.json");
const HTML: &[u8] = include_bytes!("../tests/fixtures/france.html");

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.throughput(Throughput::Bytes(MULTIFORECAST.len() as u64));
    group.bench_function("multiforecast", |b| {
        b.iter(|| black_box(parse_multiforecast(black_box(MULTIFORECAST)).unwrap()))
    });

    group.throughput(Throughput::Bytes(HTML.len() as u64));
    group.bench_function("html_settings", |b| {
        b.iter(|| black_box(mfmap::parse_html(black_box(HTML)).unwrap()))
    });

    group.finish();
}

fn bench_reshape(c: &mut Criterion) {
    let features = parse_multiforecast(MULTIFORECAST).unwrap();
    let now = Utc::now();

    let mut group = c.benchmark_group("reshape");
    group.bench_function("prevlist", |b| {
        b.iter(|| black_box(PrevList::build(black_box(&features))))
    });
    group.bench_function("graphdata", |b| {
        b.iter(|| black_box(Graphdata::build(black_box(&features), now)))
    });

    let old = Graphdata::build(&features, now);
    group.bench_function("graphdata_merge", |b| {
        b.iter(|| {
            let mut g = Graphdata::build(&features, now);
            g.merge(black_box(&old), -3, 11, now);
            black_box(g)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_reshape);
criterion_main!(benches);
