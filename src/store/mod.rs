//! Block-compressed container storage: framing, positional index, writer,
//! and the shared decompressed-block cache.

pub mod block;
pub mod cache;
pub mod file;
pub mod index;
pub mod writer;

pub use block::{Block, FORMAT_VERSION, MAX_BLOCK_SIZE, TARGET_BLOCK_SIZE};
pub use cache::{BlockCache, BlockKey, CacheStats};
pub use file::{DataFile, Fingerprint};
pub use index::{BinningIndex, Chunk, IndexResolver, IndexStats};
pub use writer::StoreWriter;
