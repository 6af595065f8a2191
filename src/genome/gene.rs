use crate::genome::{Chromosome, GenomicRange};
use crate::{PhelixError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Gene symbol to coordinate-range lookup, loaded from a tab-separated
/// gene position table.
///
/// The header may use either the short names (`gene`, `chrom`, `start`,
/// `end`) or the Ensembl export names (`Gene name`,
/// `Chromosome/scaffold name`, `Gene start (bp)`, `Gene end (bp)`).
/// Lookup is case-insensitive. Rows on unplaced scaffolds are skipped.
#[derive(Debug)]
pub struct GeneTable {
    genes: HashMap<String, GenomicRange>,
}

impl GeneTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<GeneTable> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or_else(|| PhelixError::Parse(format!("empty gene table: {}", path.display())))??;
        let names: Vec<&str> = header.trim_end().split('\t').collect();
        let find = |aliases: &[&str]| -> Result<usize> {
            names
                .iter()
                .position(|n| aliases.iter().any(|a| n.eq_ignore_ascii_case(a)))
                .ok_or_else(|| {
                    PhelixError::Parse(format!(
                        "gene table {} is missing column: {}",
                        path.display(),
                        aliases[0]
                    ))
                })
        };
        let gene_col = find(&["gene", "Gene name"])?;
        let chrom_col = find(&["chrom", "chr", "Chromosome/scaffold name"])?;
        let start_col = find(&["start", "Gene start (bp)"])?;
        let end_col = find(&["end", "Gene end (bp)"])?;

        let mut genes = HashMap::new();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let needed = gene_col.max(chrom_col).max(start_col).max(end_col);
            if fields.len() <= needed {
                return Err(PhelixError::Parse(format!(
                    "short row in gene table {}: {}",
                    path.display(),
                    line
                )));
            }
            let Some(chrom) = Chromosome::parse(fields[chrom_col]) else {
                continue;
            };
            let start = fields[start_col]
                .parse::<u32>()
                .map_err(|e| PhelixError::Parse(format!("bad gene start: {}", e)))?;
            let end = fields[end_col]
                .parse::<u32>()
                .map_err(|e| PhelixError::Parse(format!("bad gene end: {}", e)))?;
            genes.insert(
                fields[gene_col].to_ascii_uppercase(),
                GenomicRange::new(chrom, start, end),
            );
        }
        Ok(GeneTable { genes })
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Resolve a gene symbol to its range, widened by `padding` bases on
    /// both sides (clamped at position 1).
    pub fn range(&self, gene: &str, padding: u32) -> Result<GenomicRange> {
        let range = self
            .genes
            .get(&gene.to_ascii_uppercase())
            .ok_or_else(|| PhelixError::QueryInvalid(format!("gene {} not found", gene)))?;
        Ok(GenomicRange::new(
            range.chrom,
            range.start.saturating_sub(padding).max(1),
            range.end.saturating_add(padding),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_load_and_resolve() {
        let f = write_table(
            "gene\tchrom\tstart\tend\nAPOE\t19\t44905791\t44909393\nTP53\t17\t7661779\t7687550\n",
        );
        let table = GeneTable::load(f.path()).unwrap();
        assert_eq!(table.len(), 2);

        let r = table.range("apoe", 0).unwrap();
        assert_eq!(r.chrom, Chromosome::Autosome(19));
        assert_eq!((r.start, r.end), (44905791, 44909393));

        let padded = table.range("TP53", 1000).unwrap();
        assert_eq!((padded.start, padded.end), (7660779, 7688550));
    }

    #[test]
    fn test_ensembl_header_names() {
        let f = write_table(
            "Gene name\tChromosome/scaffold name\tGene start (bp)\tGene end (bp)\nBRCA2\t13\t32315508\t32400268\nSCAFFOLDY\tKI270728.1\t1\t100\n",
        );
        let table = GeneTable::load(f.path()).unwrap();
        // The unplaced-scaffold row is skipped.
        assert_eq!(table.len(), 1);
        assert!(table.range("BRCA2", 0).is_ok());
    }

    #[test]
    fn test_unknown_gene() {
        let f = write_table("gene\tchrom\tstart\tend\nAPOE\t19\t100\t200\n");
        let table = GeneTable::load(f.path()).unwrap();
        let err = table.range("NOPE", 0).unwrap_err();
        assert!(matches!(err, PhelixError::QueryInvalid(_)));
    }

    #[test]
    fn test_padding_clamps_at_one() {
        let f = write_table("gene\tchrom\tstart\tend\nNEARSTART\t1\t50\t120\n");
        let table = GeneTable::load(f.path()).unwrap();
        let r = table.range("NEARSTART", 500).unwrap();
        assert_eq!(r.start, 1);
        assert_eq!(r.end, 620);
    }
}
