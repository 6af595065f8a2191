//! Shared fixture helpers for integration tests.

use phelix::dataset::{DatasetConfig, FileSpec};
use phelix::genome::record::CANONICAL_HEADER;
use phelix::store::StoreWriter;
use std::path::Path;

/// One fixture record: chromosome, position, phenotype.
pub type Row<'a> = (&'a str, u32, &'a str);

/// Write a container holding `rows` (alleles fixed to A/T) and its index.
#[allow(dead_code)]
pub fn write_source(path: &Path, rows: &[Row]) {
    let mut writer = StoreWriter::create(path, CANONICAL_HEADER).expect("create container");
    for (chrom, pos, pheno) in rows {
        writer
            .write_line(&format!(
                "{}\t{}\tA\tT\t{}\t0.5\t0.1\t3.0\t0.25",
                chrom, pos, pheno
            ))
            .expect("write record");
    }
    writer.finish().expect("finish container");
}

pub fn file_spec(id: &str, path: &Path) -> FileSpec {
    FileSpec {
        id: id.to_string(),
        path: path.to_path_buf(),
        index_path: None,
        format_version: 1,
        phenotypes: None,
        ignore_phenos: Vec::new(),
    }
}

pub fn dataset_config(version: &str, files: Vec<FileSpec>) -> DatasetConfig {
    DatasetConfig {
        dataset_version: version.to_string(),
        cache_budget_bytes: 4 * 1024 * 1024,
        max_page_size: 10_000,
        gene_table: None,
        files,
    }
}

/// Flip the last checksum byte of the final data block (the trailing 12
/// bytes are the end-of-stream marker, preceded by the 4-byte crc).
#[allow(dead_code)]
pub fn corrupt_last_block_crc(path: &Path) {
    let mut data = std::fs::read(path).expect("read container");
    let crc_byte = data.len() - 13;
    data[crc_byte] ^= 0xff;
    std::fs::write(path, data).expect("rewrite container");
}
