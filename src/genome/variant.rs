use crate::genome::{Chromosome, GenomicRange};
use crate::{PhelixError, Result};
use std::fmt;
use std::str::FromStr;

/// A single variant identified by chromosome, position, and alleles.
///
/// Accepts both separator conventions seen in the wild:
/// `1:12345:A:T` and `1-12345-A-T` (with or without a `chr` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    pub chrom: Chromosome,
    pub pos: u32,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl Variant {
    /// The single-position range covering this variant.
    pub fn range(&self) -> GenomicRange {
        GenomicRange::point(self.chrom, self.pos)
    }
}

impl FromStr for Variant {
    type Err = PhelixError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PhelixError::QueryInvalid(format!("malformed variant: {}", s));
        let s = s.trim();
        let parts: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else {
            s.split('-').collect()
        };
        if parts.len() != 4 {
            return Err(invalid());
        }
        let chrom = Chromosome::parse(parts[0]).ok_or_else(invalid)?;
        let pos = parts[1].parse::<u32>().map_err(|_| invalid())?;
        if pos == 0 || parts[2].is_empty() || parts[3].is_empty() {
            return Err(invalid());
        }
        Ok(Variant {
            chrom,
            pos,
            ref_allele: parts[2].to_ascii_uppercase(),
            alt_allele: parts[3].to_ascii_uppercase(),
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chrom, self.pos, self.ref_allele, self.alt_allele
        )
    }
}
