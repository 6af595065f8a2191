use crate::genome::ColumnMap;
use crate::store::block::{FILE_MAGIC, FORMAT_VERSION};
use crate::{PhelixError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Cheap modification fingerprint used to detect replaced files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub mtime_ns: u128,
}

pub fn fingerprint<P: AsRef<Path>>(path: P) -> Result<Fingerprint> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(Fingerprint {
        len: meta.len(),
        mtime_ns,
    })
}

/// Default sidecar index path: the data path with `.pli` appended.
pub fn default_index_path(data_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.pli", data_path.display()))
}

/// An open, read-only association data file: identity, self-described
/// column layout, and the catalog's per-file ignore list. Replaced
/// wholesale between dataset versions, never patched.
#[derive(Debug)]
pub struct DataFile {
    pub id: String,
    pub path: PathBuf,
    pub index_path: PathBuf,
    pub format_version: u16,
    pub header: String,
    pub columns: ColumnMap,
    /// Physical offset of the first block.
    pub data_start: u64,
    pub ignore_phenos: BTreeSet<String>,
}

impl DataFile {
    /// Open a container, read its header, and resolve the column layout.
    pub fn open(
        id: &str,
        path: &Path,
        index_path: Option<&Path>,
        ignore_phenos: BTreeSet<String>,
    ) -> Result<DataFile> {
        let bad = |reason: String| PhelixError::Parse(format!("{}: {}", path.display(), reason));
        let mut file = File::open(path)
            .map_err(|e| PhelixError::Io(format!("{}: {}", path.display(), e)))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| bad(format!("short file header: {}", e)))?;
        if &magic != FILE_MAGIC {
            return Err(bad("not a PLX container".to_string()));
        }
        let version = file
            .read_u16::<LittleEndian>()
            .map_err(|e| bad(format!("short file header: {}", e)))?;
        if version != FORMAT_VERSION {
            return Err(bad(format!("unsupported format version {}", version)));
        }
        let header_len = file
            .read_u16::<LittleEndian>()
            .map_err(|e| bad(format!("short file header: {}", e)))? as usize;
        let mut header_bytes = vec![0u8; header_len];
        file.read_exact(&mut header_bytes)
            .map_err(|e| bad(format!("short column header: {}", e)))?;
        let header = String::from_utf8(header_bytes)
            .map_err(|_| bad("column header is not UTF-8".to_string()))?;
        let columns = ColumnMap::from_header(&header)?;

        Ok(DataFile {
            id: id.to_string(),
            path: path.to_path_buf(),
            index_path: index_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_index_path(path)),
            format_version: version,
            header,
            columns,
            data_start: (4 + 2 + 2 + header_len) as u64,
            ignore_phenos,
        })
    }
}
