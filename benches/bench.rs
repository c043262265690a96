// Criterion benchmarks for Similar Products

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use similar_products::core::{calculate_similarity_score, order_by_gender, Matcher};
use similar_products::models::{AttributeBundle, Gender, OptionSet, ProductRecord, ScoringWeights, Snapshot};
use std::time::Duration;

const NOTES: [&str; 12] = [
    "musk", "amber", "oud", "rose", "iris", "lemon", "vanilla", "cedar", "jasmine", "bergamot",
    "vetiver", "tonka",
];
const FAMILIES: [&str; 5] = ["floral", "woody", "fresh", "oriental", "gourmand"];

fn pick(pool: &[&str], seed: usize, count: usize) -> OptionSet {
    (0..count)
        .map(|k| pool[(seed * 7 + k * 3) % pool.len()].to_string())
        .collect()
}

fn create_bundle(seed: usize) -> AttributeBundle {
    AttributeBundle {
        concentration: pick(&["edp", "edt", "parfum"], seed, 1),
        fragrance_type: pick(&FAMILIES, seed, 1 + seed % 2),
        main_note: pick(&NOTES, seed, 1),
        top_notes: pick(&NOTES, seed + 1, 3),
        middle_notes: pick(&NOTES, seed + 2, 2 + seed % 3),
        base_notes: pick(&NOTES, seed + 3, 3),
    }
}

fn create_record(id: usize) -> ProductRecord {
    let gender = match id % 3 {
        0 => Gender::Men,
        1 => Gender::Women,
        _ => Gender::Unisex,
    };

    ProductRecord {
        id: id as i64,
        attributes: create_bundle(id),
        gender,
        created_at: Utc::now() - ChronoDuration::minutes(id as i64),
        purchasable: id % 10 != 0,
    }
}

fn create_snapshot(size: usize) -> Snapshot {
    let records = (1..=size).map(create_record).collect();
    Snapshot::build(records, Utc::now(), Duration::from_secs(3600))
}

fn bench_similarity_score(c: &mut Criterion) {
    let weights = ScoringWeights::default();
    let source = create_bundle(1);
    let item = create_bundle(4);

    c.bench_function("similarity_score", |b| {
        b.iter(|| calculate_similarity_score(black_box(&source), black_box(&item), black_box(&weights)));
    });
}

fn bench_relate(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let source = create_bundle(2);

    let mut group = c.benchmark_group("relate");

    for snapshot_size in [100, 1000, 5000].iter() {
        let snapshot = create_snapshot(*snapshot_size);

        group.bench_with_input(
            BenchmarkId::new("relate", snapshot_size),
            snapshot_size,
            |b, _| {
                b.iter(|| {
                    matcher.relate(
                        black_box(0),
                        black_box(&source),
                        black_box(Gender::Men),
                        black_box(&snapshot),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_gender_ordering(c: &mut Criterion) {
    let snapshot = create_snapshot(1000);

    c.bench_function("order_by_gender_1000_records", |b| {
        b.iter(|| black_box(order_by_gender(snapshot.records(), black_box(Gender::Women))));
    });
}

fn bench_snapshot_build(c: &mut Criterion) {
    let records: Vec<ProductRecord> = (1..=1000).map(create_record).collect();

    c.bench_function("snapshot_build_1000_records", |b| {
        b.iter(|| Snapshot::build(black_box(records.clone()), Utc::now(), Duration::from_secs(3600)));
    });
}

criterion_group!(
    benches,
    bench_similarity_score,
    bench_relate,
    bench_gender_ordering,
    bench_snapshot_build
);

criterion_main!(benches);
