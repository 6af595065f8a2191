mod common;

use common::{corrupt_last_block_crc, dataset_config, file_spec, write_source};
use phelix::dataset::Dataset;
use phelix::genome::{Chromosome, GenomicRange, Variant};
use phelix::query::{CursorState, QueryPlanner, QueryRequest};
use phelix::store::DataFile;
use phelix::PhelixError;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn positions_and_sources(response: &phelix::QueryResponse) -> Vec<(u32, String, String)> {
    response
        .records
        .iter()
        .map(|r| (r.pos, r.phenocode.clone(), r.source.clone()))
        .collect()
}

#[test]
fn test_two_file_paged_merge_example() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    let b = dir.path().join("b.plx");
    write_source(&a, &[("1", 100, "P1"), ("1", 200, "P1"), ("1", 300, "P1")]);
    write_source(&b, &[("1", 150, "P2"), ("1", 200, "P2"), ("1", 400, "P2")]);

    let dataset = Dataset::open(dataset_config(
        "v1",
        vec![file_spec("a", &a), file_spec("b", &b)],
    ))
    .unwrap();
    let planner = QueryPlanner::new(&dataset);

    let request = QueryRequest::over_range(
        GenomicRange::parse("1:100-400").unwrap(),
        ["P1", "P2"],
    )
    .with_page_size(3);

    let first = planner.execute(&request).unwrap();
    assert_eq!(
        positions_and_sources(&first),
        vec![
            (100, "P1".to_string(), "a".to_string()),
            (150, "P2".to_string(), "b".to_string()),
            // Coordinate tie: first-registered source wins.
            (200, "P1".to_string(), "a".to_string()),
        ]
    );
    assert!(first.incomplete_sources.is_empty());
    let cursor = first.next_cursor.expect("more records remain");

    let second = planner
        .execute(&request.clone().with_cursor(cursor))
        .unwrap();
    assert_eq!(
        positions_and_sources(&second),
        vec![
            (200, "P2".to_string(), "b".to_string()),
            (300, "P1".to_string(), "a".to_string()),
            (400, "P2".to_string(), "b".to_string()),
        ]
    );
    assert_eq!(second.next_cursor, None);
    assert!(second.incomplete_sources.is_empty());
}

#[test]
fn test_corrupt_block_isolated_to_one_source() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    let b = dir.path().join("b.plx");
    write_source(&a, &[("1", 100, "P1"), ("1", 300, "P1")]);
    write_source(&b, &[("1", 200, "P1")]);
    corrupt_last_block_crc(&b);

    let dataset = Dataset::open(dataset_config(
        "v1",
        vec![file_spec("a", &a), file_spec("b", &b)],
    ))
    .unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(
            GenomicRange::parse("1:1-1000").unwrap(),
            ["P1"],
        ))
        .unwrap();

    assert_eq!(response.incomplete_sources, vec!["b".to_string()]);
    assert_eq!(
        response.records.iter().map(|r| r.pos).collect::<Vec<_>>(),
        vec![100, 300]
    );
}

#[test]
fn test_missing_index_isolated_to_one_source() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    let b = dir.path().join("b.plx");
    write_source(&a, &[("2", 10, "P1")]);
    write_source(&b, &[("2", 20, "P1")]);
    std::fs::remove_file(format!("{}.pli", b.display())).unwrap();

    let dataset = Dataset::open(dataset_config(
        "v1",
        vec![file_spec("a", &a), file_spec("b", &b)],
    ))
    .unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(
            GenomicRange::parse("2:1-100").unwrap(),
            ["P1"],
        ))
        .unwrap();
    assert_eq!(response.incomplete_sources, vec!["b".to_string()]);
    assert_eq!(response.records.len(), 1);
}

#[test]
fn test_corrupt_index_isolated_to_one_source() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    write_source(&a, &[("2", 10, "P1")]);
    std::fs::write(format!("{}.pli", a.display()), b"scrambled").unwrap();

    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &a)])).unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(
            GenomicRange::parse("2:1-100").unwrap(),
            ["P1"],
        ))
        .unwrap();
    assert_eq!(response.incomplete_sources, vec!["a".to_string()]);
    assert!(response.records.is_empty());
    assert_eq!(response.next_cursor, None);
}

#[test]
fn test_zero_usable_files_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("missing.plx");
    // Never written: the catalog references a file that does not exist.
    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &a)])).unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(
            GenomicRange::parse("1:1-100").unwrap(),
            ["P1"],
        ))
        .unwrap();
    assert!(response.records.is_empty());
    assert_eq!(response.incomplete_sources, vec!["a".to_string()]);
    assert_eq!(response.next_cursor, None);
}

#[test]
fn test_phenotype_file_selection() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    let b = dir.path().join("b.plx");
    write_source(&a, &[("1", 100, "P1")]);
    write_source(&b, &[("1", 100, "P2")]);

    let mut spec_a = file_spec("a", &a);
    spec_a.phenotypes = Some(vec!["P1".to_string()]);
    let mut spec_b = file_spec("b", &b);
    spec_b.phenotypes = Some(vec!["P2".to_string()]);

    let dataset = Dataset::open(dataset_config("v1", vec![spec_a, spec_b])).unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(
            GenomicRange::parse("1:1-1000").unwrap(),
            ["P2"],
        ))
        .unwrap();
    // Only file b is selected, so only its record shows up and file a is
    // not reported incomplete (it was never requested).
    assert_eq!(response.records.len(), 1);
    assert_eq!(response.records[0].source, "b");
    assert!(response.incomplete_sources.is_empty());
}

#[test]
fn test_variant_query_filters_alleles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.plx");
    {
        use phelix::genome::record::CANONICAL_HEADER;
        use phelix::store::StoreWriter;
        let mut writer = StoreWriter::create(&path, CANONICAL_HEADER).unwrap();
        writer.write_line("1\t500\tA\tT\tP1\t0.1\t0.1\t5.0\t0.1").unwrap();
        writer.write_line("1\t500\tA\tG\tP1\t0.2\t0.1\t4.0\t0.1").unwrap();
        writer.write_line("1\t500\tA\tT\tP2\t0.3\t0.1\t3.0\t0.1").unwrap();
        writer.finish().unwrap();
    }
    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &path)])).unwrap();
    let variant: Variant = "1:500:A:T".parse().unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::for_variant(&variant, ["P1", "P2"]))
        .unwrap();
    assert_eq!(response.records.len(), 2);
    assert!(response
        .records
        .iter()
        .all(|r| r.ref_allele == "A" && r.alt_allele == "T"));
}

#[test]
fn test_query_validation() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    write_source(&a, &[("1", 100, "P1")]);
    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &a)])).unwrap();
    let planner = QueryPlanner::new(&dataset);
    let range = GenomicRange::parse("1:1-100").unwrap();

    let empty_phenos = QueryRequest::over_range(range, Vec::<String>::new());
    assert!(matches!(
        planner.execute(&empty_phenos).unwrap_err(),
        PhelixError::QueryInvalid(_)
    ));

    let backwards =
        QueryRequest::over_range(GenomicRange::new(Chromosome::Autosome(1), 200, 100), ["P1"]);
    assert!(matches!(
        planner.execute(&backwards).unwrap_err(),
        PhelixError::QueryInvalid(_)
    ));

    let zero_page = QueryRequest::over_range(range, ["P1"]).with_page_size(0);
    assert!(matches!(
        planner.execute(&zero_page).unwrap_err(),
        PhelixError::QueryInvalid(_)
    ));
}

#[test]
fn test_cursor_validation() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    write_source(&a, &[("1", 100, "P1"), ("1", 200, "P1"), ("1", 300, "P1")]);
    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &a)])).unwrap();
    let planner = QueryPlanner::new(&dataset);
    let request = QueryRequest::over_range(GenomicRange::parse("1:1-1000").unwrap(), ["P1"])
        .with_page_size(1);

    // Garbage token.
    let garbage = request.clone().with_cursor("totally-not-a-cursor");
    assert!(matches!(
        planner.execute(&garbage).unwrap_err(),
        PhelixError::CursorInvalid(_)
    ));

    // A cursor from another dataset version is rejected.
    let cursor = planner.execute(&request).unwrap().next_cursor.unwrap();
    let other = Dataset::open(dataset_config("v2", vec![file_spec("a", &a)])).unwrap();
    let err = QueryPlanner::new(&other)
        .execute(&request.clone().with_cursor(cursor.clone()))
        .unwrap_err();
    assert!(matches!(err, PhelixError::CursorInvalid(_)));

    // A cursor referencing a source missing from the catalog is rejected.
    let b = dir.path().join("b.plx");
    write_source(&b, &[("1", 150, "P1")]);
    let renamed = Dataset::open(dataset_config("v1", vec![file_spec("renamed", &b)])).unwrap();
    let err = QueryPlanner::new(&renamed)
        .execute(&request.with_cursor(cursor))
        .unwrap_err();
    assert!(matches!(err, PhelixError::CursorInvalid(_)));
}

#[test]
fn test_stale_cursor_from_changed_files_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    write_source(&a, &[("1", 100, "P1"), ("1", 200, "P1")]);
    let dataset = Dataset::open(dataset_config("v1", vec![file_spec("a", &a)])).unwrap();

    // A cursor claiming the stream already reached 1:500 while the file now
    // serves earlier records: resumption must be refused, not emit records
    // behind the saved coordinate.
    let data = DataFile::open("a", &a, None, BTreeSet::new()).unwrap();
    let state = CursorState {
        dataset_version: "v1".to_string(),
        last: Some((Chromosome::Autosome(1), 500)),
        positions: vec![("a".to_string(), data.data_start << 16)],
    };
    let request = QueryRequest::over_range(GenomicRange::parse("1:1-1000").unwrap(), ["P1"])
        .with_cursor(state.encode().unwrap());
    let err = QueryPlanner::new(&dataset).execute(&request).unwrap_err();
    assert!(matches!(err, PhelixError::CursorInvalid(_)));
}

#[test]
fn test_repeated_queries_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    let b = dir.path().join("b.plx");
    // Heavy coordinate ties across sources.
    write_source(&a, &[("3", 10, "P1"), ("3", 10, "P2"), ("3", 20, "P1")]);
    write_source(&b, &[("3", 10, "P1"), ("3", 20, "P1"), ("3", 20, "P2")]);

    let dataset = Dataset::open(dataset_config(
        "v1",
        vec![file_spec("a", &a), file_spec("b", &b)],
    ))
    .unwrap();
    let planner = QueryPlanner::new(&dataset);
    let request = QueryRequest::over_range(
        GenomicRange::parse("3:1-100").unwrap(),
        ["P1", "P2"],
    );

    let baseline = positions_and_sources(&planner.execute(&request).unwrap());
    for _ in 0..5 {
        assert_eq!(
            positions_and_sources(&planner.execute(&request).unwrap()),
            baseline
        );
    }
    // Within the baseline, coordinates never decrease and ties keep
    // registration order.
    for pair in baseline.windows(2) {
        assert!(pair[0].0 <= pair[1].0);
        if pair[0].0 == pair[1].0 {
            assert!(pair[0].2 <= pair[1].2);
        }
    }
}

#[test]
fn test_gene_query_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.plx");
    write_source(
        &a,
        &[("19", 44905800, "P1"), ("19", 44909000, "P1"), ("19", 44999999, "P1")],
    );
    let gene_table = dir.path().join("genes.tsv");
    std::fs::write(
        &gene_table,
        "gene\tchrom\tstart\tend\nAPOE\t19\t44905791\t44909393\n",
    )
    .unwrap();

    let mut config = dataset_config("v1", vec![file_spec("a", &a)]);
    config.gene_table = Some(gene_table);
    let dataset = Dataset::open(config).unwrap();

    let range = dataset.gene_range("apoe", 0).unwrap();
    let response = QueryPlanner::new(&dataset)
        .execute(&QueryRequest::over_range(range, ["P1"]))
        .unwrap();
    assert_eq!(
        response.records.iter().map(|r| r.pos).collect::<Vec<_>>(),
        vec![44905800, 44909000]
    );

    assert!(matches!(
        dataset.gene_range("UNKNOWN", 0).unwrap_err(),
        PhelixError::QueryInvalid(_)
    ));
}
