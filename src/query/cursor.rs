//! Per-file cursor iteration and the opaque resumption token.
//!
//! A `FileCursor` is an explicit pull-based state machine (chunk list,
//! current virtual offset, current block) rather than a generator, so its
//! position can be captured into a `CursorState` and resumed in a later
//! request.

use crate::genome::{AssociationRecord, Chromosome, GenomicRange};
use crate::store::block::{read_block, split_virtual_offset, virtual_offset};
use crate::store::{BlockCache, BlockKey, Chunk, DataFile, IndexResolver};
use crate::{PhelixError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::sync::Arc;

/// Serialized continuation of a paged query: the next unread virtual offset
/// of every still-open file, plus the last coordinate emitted. The planner
/// refuses a resumed page that would emit a record before `last`, catching
/// cursors whose files changed underneath them. Encoded opaquely
/// (bincode + hex) for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub dataset_version: String,
    pub last: Option<(Chromosome, u32)>,
    pub positions: Vec<(String, u64)>,
}

impl CursorState {
    pub fn encode(&self) -> Result<String> {
        let bytes = bincode::serialize(self)
            .map_err(|e| PhelixError::Io(format!("cursor encode: {}", e)))?;
        Ok(hex::encode(bytes))
    }

    pub fn decode(token: &str) -> Result<CursorState> {
        let bytes = hex::decode(token.trim())
            .map_err(|_| PhelixError::CursorInvalid("not a valid cursor token".to_string()))?;
        bincode::deserialize(&bytes)
            .map_err(|_| PhelixError::CursorInvalid("cursor token does not decode".to_string()))
    }
}

/// Lazily yields a file's records within a coordinate range, in file order.
pub struct FileCursor {
    file: Arc<DataFile>,
    cache: Arc<BlockCache>,
    range: GenomicRange,
    chunks: Vec<Chunk>,
    chunk_idx: usize,
    voffset: u64,
    block: Option<(u64, Arc<crate::store::Block>)>,
    done: bool,
}

impl FileCursor {
    /// Start at the beginning of `range`. Resolves the index once; no block
    /// is read until the first `next()`.
    pub fn open(
        file: Arc<DataFile>,
        cache: Arc<BlockCache>,
        resolver: &IndexResolver,
        range: GenomicRange,
    ) -> Result<FileCursor> {
        let chunks = resolver.resolve(&file, &range)?;
        Ok(FileCursor {
            file,
            cache,
            range,
            chunks,
            chunk_idx: 0,
            voffset: 0,
            done: false,
            block: None,
        })
    }

    /// Continue from a virtual offset saved by an earlier page.
    pub fn resume(
        file: Arc<DataFile>,
        cache: Arc<BlockCache>,
        resolver: &IndexResolver,
        range: GenomicRange,
        saved: u64,
    ) -> Result<FileCursor> {
        let mut cursor = Self::open(file, cache, resolver, range)?;
        cursor.voffset = saved;
        Ok(cursor)
    }

    pub fn file(&self) -> &Arc<DataFile> {
        &self.file
    }

    fn load_block(&self, offset: u64) -> Result<Arc<crate::store::Block>> {
        let key = BlockKey {
            file: self.file.id.clone(),
            offset,
        };
        self.cache.get_or_load(key, || {
            let mut reader = File::open(&self.file.path)
                .map_err(|e| PhelixError::Io(format!("{}: {}", self.file.path.display(), e)))?;
            match read_block(&mut reader, &self.file.id, offset)? {
                Some(block) => Ok(block),
                None => Err(PhelixError::CorruptBlock {
                    file: self.file.id.clone(),
                    offset,
                    reason: "unexpected end-of-stream block".to_string(),
                }),
            }
        })
    }

    /// Next in-range record and the virtual offset it starts at.
    ///
    /// Records before the range (chunks over-cover) are skipped; the cursor
    /// finishes at the first record past the range end. A decode failure
    /// finishes the cursor: the stream halts at that point and the caller
    /// flags the source partial.
    pub fn next(&mut self) -> Result<Option<(u64, AssociationRecord)>> {
        if self.done {
            return Ok(None);
        }
        loop {
            while self.chunk_idx < self.chunks.len()
                && self.voffset >= self.chunks[self.chunk_idx].end
            {
                self.chunk_idx += 1;
            }
            let Some(chunk) = self.chunks.get(self.chunk_idx) else {
                self.done = true;
                return Ok(None);
            };
            if self.voffset < chunk.start {
                self.voffset = chunk.start;
            }

            let (offset, within) = split_virtual_offset(self.voffset);
            let block = match &self.block {
                Some((loaded, block)) if *loaded == offset => block.clone(),
                _ => {
                    let block = match self.load_block(offset) {
                        Ok(block) => block,
                        Err(e) => {
                            self.done = true;
                            return Err(e);
                        }
                    };
                    self.block = Some((offset, block.clone()));
                    block
                }
            };

            if within >= block.payload.len() {
                self.voffset = virtual_offset(block.next_offset, 0);
                continue;
            }

            let record_voffset = self.voffset;
            let rest = &block.payload[within..];
            let line_len = rest
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(rest.len());
            let after = within + line_len + 1;
            self.voffset = virtual_offset(offset, after.min(block.payload.len()));

            let decode_err = |reason: String| PhelixError::RecordDecode {
                file: self.file.id.clone(),
                block_offset: offset,
                offset: within,
                reason,
            };
            let line = match std::str::from_utf8(&rest[..line_len]) {
                Ok(line) => line,
                Err(_) => {
                    self.done = true;
                    return Err(decode_err("record is not UTF-8".to_string()));
                }
            };
            let record = match self.file.columns.parse_record(line, &self.file.id) {
                Ok(record) => record,
                Err(reason) => {
                    self.done = true;
                    return Err(decode_err(reason));
                }
            };

            if record.chrom < self.range.chrom {
                continue;
            }
            if record.chrom > self.range.chrom
                || (record.chrom == self.range.chrom && record.pos > self.range.end)
            {
                self.done = true;
                return Ok(None);
            }
            if record.pos < self.range.start {
                continue;
            }
            return Ok(Some((record_voffset, record)));
        }
    }
}
