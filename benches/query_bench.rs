use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use phelix::dataset::{Dataset, DatasetConfig, FileSpec};
use phelix::genome::record::CANONICAL_HEADER;
use phelix::genome::GenomicRange;
use phelix::query::{QueryPlanner, QueryRequest};
use phelix::store::StoreWriter;
use std::hint::black_box;
use std::path::Path;

fn write_fixture(path: &Path, records: u32) {
    let mut writer = StoreWriter::create(path, CANONICAL_HEADER).unwrap();
    for i in 0..records {
        writer
            .write_line(&format!(
                "1\t{}\tA\tT\tP{}\t0.123456\t0.04321\t6.789\t0.321",
                i * 10 + 1,
                i % 5 + 1
            ))
            .unwrap();
    }
    writer.finish().unwrap();
}

fn fixture_dataset(dir: &Path, records: u32) -> Dataset {
    let path = dir.join("bench.plx");
    write_fixture(&path, records);
    Dataset::open(DatasetConfig {
        dataset_version: "bench".to_string(),
        cache_budget_bytes: 64 * 1024 * 1024,
        max_page_size: 100_000,
        gene_table: None,
        files: vec![FileSpec {
            id: "bench".to_string(),
            path,
            index_path: None,
            format_version: 1,
            phenotypes: None,
            ignore_phenos: Vec::new(),
        }],
    })
    .unwrap()
}

fn bench_region_queries(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = fixture_dataset(dir.path(), 200_000);
    let mut group = c.benchmark_group("region_query");

    for span in [1_000u32, 100_000, 1_000_000].iter() {
        let range =
            GenomicRange::parse(&format!("1:500000-{}", 500_000 + span)).unwrap();
        let request = QueryRequest::over_range(range, ["P1", "P2", "P3", "P4", "P5"])
            .with_page_size(100_000);
        group.bench_with_input(BenchmarkId::from_parameter(span), span, |b, _| {
            let planner = QueryPlanner::new(&dataset);
            b.iter(|| black_box(planner.execute(&request).unwrap()));
        });
    }
    group.finish();
}

fn bench_paged_scan(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = fixture_dataset(dir.path(), 50_000);
    let range = GenomicRange::parse("1:1-500001").unwrap();

    c.bench_function("paged_scan_1000", |b| {
        let planner = QueryPlanner::new(&dataset);
        b.iter(|| {
            let mut cursor: Option<String> = None;
            loop {
                let mut request = QueryRequest::over_range(
                    range,
                    ["P1", "P2", "P3", "P4", "P5"],
                )
                .with_page_size(1000);
                if let Some(token) = cursor.take() {
                    request = request.with_cursor(token);
                }
                let response = planner.execute(&request).unwrap();
                black_box(&response.records);
                match response.next_cursor {
                    Some(token) => cursor = Some(token),
                    None => break,
                }
            }
        });
    });
}

criterion_group!(benches, bench_region_queries, bench_paged_scan);
criterion_main!(benches);
