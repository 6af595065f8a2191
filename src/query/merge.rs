//! K-way merge of per-file cursors into one coordinate-ordered stream.

use crate::genome::{AssociationRecord, Chromosome};
use crate::query::cursor::FileCursor;
use crate::store::DataFile;
use crate::PhelixError;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use tracing::warn;

/// Record-level filters applied before a record is buffered into the merge.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub phenotypes: BTreeSet<String>,
    /// Exact-allele restriction for variant (point) queries.
    pub alleles: Option<(String, String)>,
}

impl RecordFilter {
    pub fn accept(&self, file: &DataFile, record: &AssociationRecord) -> bool {
        if !self.phenotypes.contains(&record.phenocode) {
            return false;
        }
        if file.ignore_phenos.contains(&record.phenocode) {
            return false;
        }
        if let Some((ref_allele, alt_allele)) = &self.alleles {
            if record.ref_allele != *ref_allele || record.alt_allele != *alt_allele {
                return false;
            }
        }
        true
    }
}

struct MergeEntry {
    chrom: Chromosome,
    pos: u32,
    priority: usize,
    voffset: u64,
    record: AssociationRecord,
}

impl MergeEntry {
    fn key(&self) -> (Chromosome, u32, usize) {
        (self.chrom, self.pos, self.priority)
    }
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for MergeEntry {}
impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

struct MergeSource {
    id: String,
    cursor: FileCursor,
}

/// Merges per-file cursors by (chromosome, position), breaking coordinate
/// ties by source registration order so repeated queries are reproducible.
/// One buffered record per input; a source that fails is dropped from the
/// merge and recorded, and the remaining sources keep streaming.
pub struct MergeIter {
    sources: Vec<MergeSource>,
    heap: BinaryHeap<Reverse<MergeEntry>>,
    filter: RecordFilter,
    failures: Vec<(String, PhelixError)>,
}

impl MergeIter {
    pub fn new(filter: RecordFilter) -> Self {
        Self {
            sources: Vec::new(),
            heap: BinaryHeap::new(),
            filter,
            failures: Vec::new(),
        }
    }

    /// Register a source. Priority is the registration order.
    pub fn push_source(&mut self, id: &str, cursor: FileCursor) {
        let priority = self.sources.len();
        self.sources.push(MergeSource {
            id: id.to_string(),
            cursor,
        });
        self.refill(priority);
    }

    fn refill(&mut self, priority: usize) {
        let source = &mut self.sources[priority];
        loop {
            match source.cursor.next() {
                Ok(Some((voffset, record))) => {
                    if !self.filter.accept(source.cursor.file(), &record) {
                        continue;
                    }
                    self.heap.push(Reverse(MergeEntry {
                        chrom: record.chrom,
                        pos: record.pos,
                        priority,
                        voffset,
                        record,
                    }));
                    return;
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(source = %source.id, error = %e, "source dropped from merge");
                    self.failures.push((source.id.clone(), e));
                    return;
                }
            }
        }
    }

    /// Emit the next record in global coordinate order.
    pub fn next(&mut self) -> Option<AssociationRecord> {
        let Reverse(entry) = self.heap.pop()?;
        self.refill(entry.priority);
        Some(entry.record)
    }

    /// Whether any source still has a buffered record.
    pub fn is_active(&self) -> bool {
        !self.heap.is_empty()
    }

    /// Next unread position of every still-open source, in priority order.
    pub fn positions(&self) -> Vec<(String, u64)> {
        let mut positions: Vec<(usize, u64)> = self
            .heap
            .iter()
            .map(|Reverse(e)| (e.priority, e.voffset))
            .collect();
        positions.sort_by_key(|(priority, _)| *priority);
        positions
            .into_iter()
            .map(|(priority, voffset)| (self.sources[priority].id.clone(), voffset))
            .collect()
    }

    pub fn failures(&self) -> &[(String, PhelixError)] {
        &self.failures
    }
}
