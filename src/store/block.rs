//! Block framing for the PLX container.
//!
//! A data file is a small file header followed by independently
//! decompressible blocks:
//!
//! ```text
//! PLX\x01 | u16 version | u16 header_len | column header line
//! PBK\x01 | u32 compressed_len | u32 raw_len | deflate payload | u32 crc32(raw)
//! ...
//! PBK\x01 | u32 0 | u32 0                        (end of stream)
//! ```
//!
//! All integers are little-endian. Blocks are record-aligned: a record line
//! never spans two blocks, so any record start is addressable as a virtual
//! offset `physical_block_offset << 16 | in_block_byte_offset`.

use crate::{PhelixError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::{Read, Seek, SeekFrom, Write};

pub const FILE_MAGIC: &[u8; 4] = b"PLX\x01";
pub const BLOCK_MAGIC: &[u8; 4] = b"PBK\x01";
pub const INDEX_MAGIC: &[u8; 4] = b"PLI\x01";
pub const FORMAT_VERSION: u16 = 1;

/// Hard cap on a block's decompressed payload; in-block byte offsets,
/// including the one-past-the-end offset, must fit the low 16 bits of a
/// virtual offset.
pub const MAX_BLOCK_SIZE: usize = (1 << 16) - 1;
/// Blocks are flushed once the payload reaches this size.
pub const TARGET_BLOCK_SIZE: usize = 48 * 1024;

const BLOCK_HEADER_SIZE: usize = 12;
const BLOCK_TRAILER_SIZE: usize = 4;

/// A decompressed block payload plus the physical offset of the block that
/// follows it.
#[derive(Debug)]
pub struct Block {
    pub payload: Vec<u8>,
    pub next_offset: u64,
}

/// Pack a (physical block offset, in-block byte offset) pair.
pub fn virtual_offset(block_offset: u64, within: usize) -> u64 {
    debug_assert!(within <= MAX_BLOCK_SIZE);
    (block_offset << 16) | within as u64
}

/// Split a virtual offset into (physical block offset, in-block byte offset).
pub fn split_virtual_offset(voffset: u64) -> (u64, usize) {
    (voffset >> 16, (voffset & 0xffff) as usize)
}

fn read_up_to<R: Read>(reader: &mut R, n: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    reader.take(n as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read and validate the block at `offset`. Returns `None` for the
/// end-of-stream marker. Decompression is all-or-nothing: no partially
/// decoded payload is ever returned.
pub fn read_block<R: Read + Seek>(
    reader: &mut R,
    file: &str,
    offset: u64,
) -> Result<Option<Block>> {
    let corrupt = |reason: String| PhelixError::CorruptBlock {
        file: file.to_string(),
        offset,
        reason,
    };

    reader.seek(SeekFrom::Start(offset))?;
    let header = read_up_to(reader, BLOCK_HEADER_SIZE)?;
    if header.len() < BLOCK_HEADER_SIZE {
        return Err(PhelixError::TruncatedRead {
            file: file.to_string(),
            offset,
            expected: BLOCK_HEADER_SIZE,
            got: header.len(),
        });
    }
    if &header[0..4] != BLOCK_MAGIC {
        return Err(corrupt("bad block magic".to_string()));
    }
    let compressed_len = (&header[4..8]).read_u32::<LittleEndian>()? as usize;
    let raw_len = (&header[8..12]).read_u32::<LittleEndian>()? as usize;
    if compressed_len == 0 && raw_len == 0 {
        return Ok(None);
    }
    if raw_len > MAX_BLOCK_SIZE {
        return Err(corrupt(format!("declared payload size {} exceeds limit", raw_len)));
    }

    let body = read_up_to(reader, compressed_len + BLOCK_TRAILER_SIZE)?;
    if body.len() < compressed_len + BLOCK_TRAILER_SIZE {
        return Err(PhelixError::TruncatedRead {
            file: file.to_string(),
            offset,
            expected: compressed_len + BLOCK_TRAILER_SIZE,
            got: body.len(),
        });
    }
    let stored_crc = (&body[compressed_len..]).read_u32::<LittleEndian>()?;

    let mut payload = Vec::with_capacity(raw_len);
    DeflateDecoder::new(&body[..compressed_len])
        .read_to_end(&mut payload)
        .map_err(|e| corrupt(format!("inflate failed: {}", e)))?;
    if payload.len() != raw_len {
        return Err(corrupt(format!(
            "decompressed to {} bytes, header declared {}",
            payload.len(),
            raw_len
        )));
    }
    let mut crc = Crc::new();
    crc.update(&payload);
    if crc.sum() != stored_crc {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    Ok(Some(Block {
        payload,
        next_offset: offset + (BLOCK_HEADER_SIZE + compressed_len + BLOCK_TRAILER_SIZE) as u64,
    }))
}

/// Compress and frame one block. Returns the number of bytes written.
pub fn write_block<W: Write>(writer: &mut W, payload: &[u8]) -> Result<u64> {
    debug_assert!(!payload.is_empty() && payload.len() <= MAX_BLOCK_SIZE);
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    let compressed = encoder.finish()?;
    let mut crc = Crc::new();
    crc.update(payload);

    writer.write_all(BLOCK_MAGIC)?;
    writer.write_u32::<LittleEndian>(compressed.len() as u32)?;
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_all(&compressed)?;
    writer.write_u32::<LittleEndian>(crc.sum())?;
    Ok((BLOCK_HEADER_SIZE + compressed.len() + BLOCK_TRAILER_SIZE) as u64)
}

/// Write the end-of-stream marker. Returns the number of bytes written.
pub fn write_eos<W: Write>(writer: &mut W) -> Result<u64> {
    writer.write_all(BLOCK_MAGIC)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(0)?;
    Ok(BLOCK_HEADER_SIZE as u64)
}
