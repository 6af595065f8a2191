use crate::genome::Chromosome;
use crate::{PhelixError, Result};
use serde::{Deserialize, Serialize};

/// One per-variant, per-phenotype association result.
///
/// Statistics may be absent in the source data ("NA"); they decode to `None`
/// instead of dropping or failing the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub chrom: Chromosome,
    pub pos: u32,
    pub ref_allele: String,
    pub alt_allele: String,
    pub phenocode: String,
    /// Catalog id of the file this record came from.
    pub source: String,
    pub beta: Option<f64>,
    pub sebeta: Option<f64>,
    pub mlog10p: Option<f64>,
    pub af: Option<f64>,
}

impl AssociationRecord {
    /// Tab-separated rendering in canonical column order; absent statistics
    /// print as `NA`.
    pub fn to_tsv(&self) -> String {
        fn stat(v: Option<f64>) -> String {
            v.map(|x| x.to_string()).unwrap_or_else(|| "NA".to_string())
        }
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos,
            self.ref_allele,
            self.alt_allele,
            self.phenocode,
            self.source,
            stat(self.beta),
            stat(self.sebeta),
            stat(self.mlog10p),
            stat(self.af),
        )
    }
}

/// Canonical header line written by the store writer.
pub const CANONICAL_HEADER: &str = "chrom\tpos\tref\talt\tphenocode\tbeta\tsebeta\tmlog10p\taf";

/// Maps a file's self-describing tab-separated header to field positions.
///
/// Unknown columns are ignored so files may carry extra columns without
/// breaking older readers. Column-name aliases cover the headers used by
/// upstream result exports (`chr`, `trait`, `se`, `mlogp`).
#[derive(Debug, Clone)]
pub struct ColumnMap {
    chrom: usize,
    pos: usize,
    ref_allele: usize,
    alt_allele: usize,
    phenocode: usize,
    beta: Option<usize>,
    sebeta: Option<usize>,
    mlog10p: Option<usize>,
    af: Option<usize>,
}

impl ColumnMap {
    pub fn from_header(header: &str) -> Result<ColumnMap> {
        let names: Vec<&str> = header.trim_end_matches(['\r', '\n']).split('\t').collect();
        let find = |aliases: &[&str]| -> Option<usize> {
            names.iter().position(|n| {
                let n = n.trim_start_matches('#');
                aliases.iter().any(|a| n.eq_ignore_ascii_case(a))
            })
        };
        let required = |aliases: &[&str]| -> Result<usize> {
            find(aliases).ok_or_else(|| {
                PhelixError::Parse(format!("header is missing a required column: {}", aliases[0]))
            })
        };
        Ok(ColumnMap {
            chrom: required(&["chrom", "chr"])?,
            pos: required(&["pos", "position"])?,
            ref_allele: required(&["ref"])?,
            alt_allele: required(&["alt"])?,
            phenocode: required(&["phenocode", "trait", "pheno"])?,
            beta: find(&["beta"]),
            sebeta: find(&["sebeta", "se"]),
            mlog10p: find(&["mlog10p", "mlogp"]),
            af: find(&["af", "maf"]),
        })
    }

    /// Decode one tab-separated line. The error is a bare reason; the caller
    /// attaches file and offset context.
    pub fn parse_record(
        &self,
        line: &str,
        source: &str,
    ) -> std::result::Result<AssociationRecord, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        let chrom_str = field(&fields, self.chrom)?;
        let chrom = Chromosome::parse(chrom_str)
            .ok_or_else(|| format!("unknown chromosome: {}", chrom_str))?;
        let pos = field(&fields, self.pos)?
            .parse::<u32>()
            .map_err(|e| format!("bad position: {}", e))?;
        if pos == 0 {
            return Err("position must be 1-based".to_string());
        }
        Ok(AssociationRecord {
            chrom,
            pos,
            ref_allele: field(&fields, self.ref_allele)?.to_string(),
            alt_allele: field(&fields, self.alt_allele)?.to_string(),
            phenocode: field(&fields, self.phenocode)?.to_string(),
            source: source.to_string(),
            beta: stat(&fields, self.beta)?,
            sebeta: stat(&fields, self.sebeta)?,
            mlog10p: stat(&fields, self.mlog10p)?,
            af: stat(&fields, self.af)?,
        })
    }
}

fn field<'a>(fields: &[&'a str], idx: usize) -> std::result::Result<&'a str, String> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| format!("expected at least {} fields, got {}", idx + 1, fields.len()))
}

/// Numeric statistic column: absent column or "NA" decodes to `None`.
fn stat(fields: &[&str], idx: Option<usize>) -> std::result::Result<Option<f64>, String> {
    let Some(idx) = idx else { return Ok(None) };
    let raw = field(fields, idx)?;
    match raw {
        "NA" | "" | "." => Ok(None),
        _ => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| format!("bad numeric value {:?}: {}", raw, e)),
    }
}
