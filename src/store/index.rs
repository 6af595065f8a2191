//! Positional sidecar index for PLX containers.
//!
//! Hierarchical binning over 0-based half-open intervals, five levels with
//! 16 kb bins at the finest level, plus a 16 kb linear index used as a
//! virtual-offset lower bound when resolving a query range. Bin chunks map
//! coordinate bins to contiguous virtual-offset ranges in the data file.

use crate::genome::{Chromosome, GenomicRange};
use crate::store::block::INDEX_MAGIC;
use crate::store::file::{fingerprint, Fingerprint};
use crate::store::DataFile;
use crate::{PhelixError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Index format version, independent of the container version.
pub const INDEX_VERSION: u16 = 1;

/// Bins cover positions below 2^29; ids are 0..37449.
const BIN_LIMIT: u32 = 37450;
const LINEAR_SHIFT: u32 = 14;
const LEVELS: [(u32, u32); 5] = [(26, 1), (23, 9), (20, 73), (17, 585), (14, 4681)];

/// Smallest bin fully containing [beg, end) (0-based half-open).
fn reg2bin(beg: u32, end: u32) -> u32 {
    let end = end - 1;
    for &(shift, offset) in LEVELS.iter().rev() {
        if beg >> shift == end >> shift {
            return offset + (beg >> shift);
        }
    }
    0
}

/// All bins that may hold intervals overlapping [beg, end).
fn reg2bins(beg: u32, end: u32) -> Vec<u32> {
    let end = end - 1;
    let mut bins = vec![0];
    for (shift, offset) in LEVELS {
        for bin in (offset + (beg >> shift))..=(offset + (end >> shift)) {
            bins.push(bin);
        }
    }
    bins
}

/// A contiguous virtual-offset range in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChromIndex {
    bins: BTreeMap<u32, Vec<Chunk>>,
    linear: Vec<u64>,
}

/// Per-chromosome binning index for one data file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BinningIndex {
    chroms: BTreeMap<Chromosome, ChromIndex>,
}

/// Summary counts for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub chromosomes: usize,
    pub bins: usize,
    pub chunks: usize,
}

impl BinningIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one record's interval and virtual-offset span. Records must
    /// arrive in file order (non-decreasing virtual offsets).
    pub fn add_record(&mut self, chrom: Chromosome, beg: u32, end: u32, vstart: u64, vend: u64) {
        let ci = self.chroms.entry(chrom).or_default();
        let bin = reg2bin(beg, end);
        let chunks = ci.bins.entry(bin).or_default();
        match chunks.last_mut() {
            Some(last) if last.end == vstart => last.end = vend,
            _ => chunks.push(Chunk {
                start: vstart,
                end: vend,
            }),
        }
        let first_window = (beg >> LINEAR_SHIFT) as usize;
        let last_window = ((end - 1) >> LINEAR_SHIFT) as usize;
        if ci.linear.len() <= last_window {
            ci.linear.resize(last_window + 1, 0);
        }
        for window in first_window..=last_window {
            if ci.linear[window] == 0 {
                ci.linear[window] = vstart;
            }
        }
    }

    /// Fill linear-index gaps forward so every window carries a usable lower
    /// bound. Called once, after the last record.
    pub fn finalize(&mut self) {
        for ci in self.chroms.values_mut() {
            let mut bound = 0;
            for slot in ci.linear.iter_mut() {
                if *slot == 0 {
                    *slot = bound;
                } else {
                    bound = *slot;
                }
            }
        }
    }

    /// All chunks that may contain records overlapping `range`, sorted and
    /// with overlapping/adjacent chunks merged. Over-approximation is fine;
    /// the cursor filters at record level.
    pub fn resolve(&self, range: &GenomicRange) -> Vec<Chunk> {
        let Some(ci) = self.chroms.get(&range.chrom) else {
            return Vec::new();
        };
        let beg = range.start.saturating_sub(1);
        let end = range.end; // inclusive range -> half-open end
        if end <= beg {
            return Vec::new();
        }

        let window = (beg >> LINEAR_SHIFT) as usize;
        let min_voffset = if ci.linear.is_empty() {
            0
        } else {
            ci.linear[window.min(ci.linear.len() - 1)]
        };

        let mut chunks: Vec<Chunk> = Vec::new();
        for bin in reg2bins(beg, end) {
            if let Some(bin_chunks) = ci.bins.get(&bin) {
                chunks.extend(
                    bin_chunks
                        .iter()
                        .filter(|c| min_voffset == 0 || c.end > min_voffset),
                );
            }
        }
        chunks.sort_by_key(|c| c.start);

        let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match merged.last_mut() {
                Some(last) if chunk.start <= last.end => last.end = last.end.max(chunk.end),
                _ => merged.push(chunk),
            }
        }
        merged
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            chromosomes: self.chroms.len(),
            bins: self.chroms.values().map(|c| c.bins.len()).sum(),
            chunks: self
                .chroms
                .values()
                .flat_map(|c| c.bins.values())
                .map(|v| v.len())
                .sum(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        std::io::Write::write_all(&mut writer, INDEX_MAGIC)?;
        writer.write_u16::<LittleEndian>(INDEX_VERSION)?;
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| PhelixError::Io(format!("failed to serialize index: {}", e)))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P, file_id: &str) -> Result<BinningIndex> {
        let corrupt = |reason: String| PhelixError::IndexCorrupt {
            file: file_id.to_string(),
            reason,
        };
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut reader, &mut magic)
            .map_err(|e| corrupt(format!("short magic: {}", e)))?;
        if &magic != INDEX_MAGIC {
            return Err(corrupt("bad index magic".to_string()));
        }
        let version = reader
            .read_u16::<LittleEndian>()
            .map_err(|e| corrupt(format!("short version field: {}", e)))?;
        if version != INDEX_VERSION {
            return Err(corrupt(format!("unsupported index version {}", version)));
        }
        let index: BinningIndex = bincode::deserialize_from(&mut reader)
            .map_err(|e| corrupt(format!("decode failed: {}", e)))?;
        index.validate(file_id)?;
        Ok(index)
    }

    /// Structural validation: bin ids in bounds, chunk offsets well formed
    /// and non-decreasing per bin, linear index monotonic.
    fn validate(&self, file_id: &str) -> Result<()> {
        let corrupt = |reason: String| PhelixError::IndexCorrupt {
            file: file_id.to_string(),
            reason,
        };
        for (chrom, ci) in &self.chroms {
            for (&bin, chunks) in &ci.bins {
                if bin >= BIN_LIMIT {
                    return Err(corrupt(format!("bin id {} out of range on {}", bin, chrom)));
                }
                let mut prev_end = 0;
                for chunk in chunks {
                    if chunk.start >= chunk.end {
                        return Err(corrupt(format!(
                            "empty chunk [{}, {}) in bin {} on {}",
                            chunk.start, chunk.end, bin, chrom
                        )));
                    }
                    if chunk.start < prev_end {
                        return Err(corrupt(format!(
                            "chunk offsets regress in bin {} on {}",
                            bin, chrom
                        )));
                    }
                    prev_end = chunk.end;
                }
            }
            let mut prev = 0;
            for &v in &ci.linear {
                if v != 0 && v < prev {
                    return Err(corrupt(format!("linear index regresses on {}", chrom)));
                }
                if v != 0 {
                    prev = v;
                }
            }
        }
        Ok(())
    }
}

struct CachedIndex {
    fingerprint: Fingerprint,
    index: BinningIndex,
}

/// Loads and caches parsed indexes per file identity, keyed by a
/// modification fingerprint so a replaced sidecar is re-parsed.
pub struct IndexResolver {
    cache: DashMap<String, Arc<CachedIndex>>,
}

impl IndexResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// All chunks of `file` that may overlap `range`.
    pub fn resolve(&self, file: &DataFile, range: &GenomicRange) -> Result<Vec<Chunk>> {
        Ok(self.index_for(file)?.index.resolve(range))
    }

    fn index_for(&self, file: &DataFile) -> Result<Arc<CachedIndex>> {
        if !file.index_path.exists() {
            return Err(PhelixError::IndexNotFound {
                file: file.id.clone(),
                path: file.index_path.display().to_string(),
            });
        }
        let current = fingerprint(&file.index_path)?;
        if let Some(cached) = self.cache.get(&file.id) {
            if cached.fingerprint == current {
                return Ok(cached.value().clone());
            }
        }
        debug!(file = %file.id, path = %file.index_path.display(), "parsing index");
        let index = BinningIndex::load(&file.index_path, &file.id)?;
        let cached = Arc::new(CachedIndex {
            fingerprint: current,
            index,
        });
        self.cache.insert(file.id.clone(), cached.clone());
        Ok(cached)
    }
}

impl Default for IndexResolver {
    fn default() -> Self {
        Self::new()
    }
}
