use crate::{PhelixError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human chromosome with a fixed rank order: 1-22, X, Y, MT.
///
/// The variant order gives the derived `Ord` exactly that rank order, which
/// is the global sort order of all stored and emitted records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Chromosome {
    Autosome(u8),
    X,
    Y,
    Mito,
}

impl Chromosome {
    /// Parse a chromosome name. Accepts an optional `chr` prefix and the
    /// numeric aliases 23/24/25 used in FinnGen-style exports.
    pub fn parse(s: &str) -> Option<Chromosome> {
        let s = s.trim();
        let s = s
            .strip_prefix("chr")
            .or_else(|| s.strip_prefix("CHR"))
            .unwrap_or(s);
        match s {
            "X" | "x" | "23" => Some(Chromosome::X),
            "Y" | "y" | "24" => Some(Chromosome::Y),
            "MT" | "M" | "mt" | "m" | "25" => Some(Chromosome::Mito),
            _ => match s.parse::<u8>() {
                Ok(n) if (1..=22).contains(&n) => Some(Chromosome::Autosome(n)),
                _ => None,
            },
        }
    }
}

impl FromStr for Chromosome {
    type Err = PhelixError;

    fn from_str(s: &str) -> Result<Self> {
        Chromosome::parse(s)
            .ok_or_else(|| PhelixError::Parse(format!("unknown chromosome: {}", s)))
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(n) => write!(f, "{}", n),
            Chromosome::X => write!(f, "X"),
            Chromosome::Y => write!(f, "Y"),
            Chromosome::Mito => write!(f, "MT"),
        }
    }
}

/// Inclusive 1-based coordinate range on a single chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicRange {
    pub chrom: Chromosome,
    pub start: u32,
    pub end: u32,
}

impl GenomicRange {
    pub fn new(chrom: Chromosome, start: u32, end: u32) -> Self {
        Self { chrom, start, end }
    }

    /// Single-position range.
    pub fn point(chrom: Chromosome, pos: u32) -> Self {
        Self {
            chrom,
            start: pos,
            end: pos,
        }
    }

    /// Parse `chrom:start-end` or `chrom:pos`.
    pub fn parse(s: &str) -> Result<GenomicRange> {
        let invalid = || PhelixError::QueryInvalid(format!("malformed region: {}", s));
        let (chrom_str, span) = s.split_once(':').ok_or_else(invalid)?;
        let chrom = Chromosome::parse(chrom_str).ok_or_else(invalid)?;
        let (start, end) = match span.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<u32>().map_err(|_| invalid())?,
                b.trim().parse::<u32>().map_err(|_| invalid())?,
            ),
            None => {
                let pos = span.trim().parse::<u32>().map_err(|_| invalid())?;
                (pos, pos)
            }
        };
        Ok(GenomicRange { chrom, start, end })
    }

    pub fn contains(&self, chrom: Chromosome, pos: u32) -> bool {
        chrom == self.chrom && pos >= self.start && pos <= self.end
    }
}

impl fmt::Display for GenomicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}
