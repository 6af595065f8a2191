//! Builds PLX containers and their sidecar indexes from sorted association
//! records. Data preparation tooling: served datasets are immutable, this
//! only ever creates new files.

use crate::genome::{Chromosome, ColumnMap};
use crate::store::block::{
    virtual_offset, write_block, write_eos, FILE_MAGIC, FORMAT_VERSION, MAX_BLOCK_SIZE,
    TARGET_BLOCK_SIZE,
};
use crate::store::file::default_index_path;
use crate::store::index::BinningIndex;
use crate::{PhelixError, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct StoreWriter {
    out: BufWriter<File>,
    path: PathBuf,
    index_path: PathBuf,
    columns: ColumnMap,
    index: BinningIndex,
    block_buf: Vec<u8>,
    /// Physical offset where the buffered block will land.
    block_offset: u64,
    last_key: Option<(Chromosome, u32)>,
    records: u64,
}

impl StoreWriter {
    /// Create a container at `path` (index sidecar alongside) with the given
    /// tab-separated column header.
    pub fn create<P: AsRef<Path>>(path: P, header: &str) -> Result<StoreWriter> {
        let path = path.as_ref();
        let header = header.trim_end_matches(['\r', '\n']);
        let columns = ColumnMap::from_header(header)?;
        if header.len() > u16::MAX as usize {
            return Err(PhelixError::Parse("column header too long".to_string()));
        }

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(FILE_MAGIC)?;
        out.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        out.write_u16::<LittleEndian>(header.len() as u16)?;
        out.write_all(header.as_bytes())?;

        Ok(StoreWriter {
            out,
            path: path.to_path_buf(),
            index_path: default_index_path(path),
            columns,
            index: BinningIndex::new(),
            block_buf: Vec::with_capacity(TARGET_BLOCK_SIZE),
            block_offset: (4 + 2 + 2 + header.len()) as u64,
            last_key: None,
            records: 0,
        })
    }

    /// Append one record line. Lines must arrive in non-decreasing
    /// (chromosome, position) order; blank lines are skipped.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(());
        }
        let record = self.columns.parse_record(line, "").map_err(|reason| {
            PhelixError::Parse(format!(
                "{} record {}: {}",
                self.path.display(),
                self.records + 1,
                reason
            ))
        })?;
        let key = (record.chrom, record.pos);
        if let Some(last) = self.last_key {
            if key < last {
                return Err(PhelixError::Parse(format!(
                    "{}: records out of order ({}:{} after {}:{})",
                    self.path.display(),
                    key.0,
                    key.1,
                    last.0,
                    last.1
                )));
            }
        }

        let needed = line.len() + 1;
        if needed > MAX_BLOCK_SIZE {
            return Err(PhelixError::Parse(format!(
                "{}: record of {} bytes exceeds block capacity",
                self.path.display(),
                line.len()
            )));
        }
        if !self.block_buf.is_empty()
            && (self.block_buf.len() + needed > MAX_BLOCK_SIZE
                || self.block_buf.len() >= TARGET_BLOCK_SIZE)
        {
            self.flush_block()?;
        }

        let vstart = virtual_offset(self.block_offset, self.block_buf.len());
        self.block_buf.extend_from_slice(line.as_bytes());
        self.block_buf.push(b'\n');
        let vend = virtual_offset(self.block_offset, self.block_buf.len());

        let beg = record.pos - 1;
        let end = beg + (record.ref_allele.len() as u32).max(1);
        self.index.add_record(record.chrom, beg, end, vstart, vend);

        self.last_key = Some(key);
        self.records += 1;
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_buf.is_empty() {
            return Ok(());
        }
        let written = write_block(&mut self.out, &self.block_buf)?;
        self.block_offset += written;
        self.block_buf.clear();
        Ok(())
    }

    /// Flush, write the end-of-stream marker, and write the sidecar index.
    /// Returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_block()?;
        write_eos(&mut self.out)?;
        self.out.flush()?;
        self.index.finalize();
        self.index.save(&self.index_path)?;
        info!(
            path = %self.path.display(),
            records = self.records,
            "wrote container and index"
        );
        Ok(self.records)
    }
}
