pub mod cli;
pub mod dataset;
pub mod genome;
pub mod query;
pub mod store;

pub use crate::dataset::Dataset;
pub use crate::query::planner::{QueryPlanner, QueryRequest, QueryResponse};

use thiserror::Error;

/// Errors produced while loading, indexing, and querying association data.
///
/// Errors raised while reading a single source file (`IndexNotFound`,
/// `IndexCorrupt`, `CorruptBlock`, `TruncatedRead`, `RecordDecode`, `Io`)
/// never fail a query on their own; the planner drops the failing source and
/// reports it in `incomplete_sources`. `QueryInvalid` and `CursorInvalid`
/// reject the request before any file is touched.
///
/// The enum is `Clone` (io errors are carried as strings) so the block cache
/// can hand a single load failure to every waiter of a deduplicated load.
#[derive(Error, Debug, Clone)]
pub enum PhelixError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("no index found for {file}: {path}")]
    IndexNotFound { file: String, path: String },

    #[error("corrupt index for {file}: {reason}")]
    IndexCorrupt { file: String, reason: String },

    #[error("corrupt block in {file} at offset {offset}: {reason}")]
    CorruptBlock {
        file: String,
        offset: u64,
        reason: String,
    },

    #[error("truncated read in {file} at offset {offset}: expected {expected} bytes, got {got}")]
    TruncatedRead {
        file: String,
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("record decode error in {file}, block {block_offset}, byte {offset}: {reason}")]
    RecordDecode {
        file: String,
        block_offset: u64,
        offset: usize,
        reason: String,
    },

    #[error("invalid query: {0}")]
    QueryInvalid(String),

    #[error("invalid cursor: {0}")]
    CursorInvalid(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for PhelixError {
    fn from(e: std::io::Error) -> Self {
        PhelixError::Io(e.to_string())
    }
}

impl PhelixError {
    /// Whether this error is scoped to a single source file rather than the
    /// request as a whole.
    pub fn is_source_scoped(&self) -> bool {
        !matches!(
            self,
            PhelixError::QueryInvalid(_) | PhelixError::CursorInvalid(_) | PhelixError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PhelixError>;
