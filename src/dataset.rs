//! Dataset configuration and the per-version query context.
//!
//! A `Dataset` is the explicitly constructed context that owns everything a
//! query needs: the file catalog, the parsed-index cache, and the block
//! cache. Its lifecycle is tied to one dataset version; a version swap
//! builds a fresh `Dataset` instead of mutating shared state.

use crate::genome::{GeneTable, GenomicRange};
use crate::store::{BlockCache, CacheStats, DataFile, IndexResolver};
use crate::{PhelixError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

fn default_cache_budget() -> usize {
    256 * 1024 * 1024
}

fn default_max_page_size() -> usize {
    10_000
}

fn default_format_version() -> u16 {
    crate::store::FORMAT_VERSION
}

/// One catalog entry: identity, paths, expected format version, and
/// phenotype metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSpec {
    pub id: String,
    pub path: PathBuf,
    /// Defaults to the data path with `.pli` appended.
    pub index_path: Option<PathBuf>,
    #[serde(default = "default_format_version")]
    pub format_version: u16,
    /// Phenotypes this file holds; omit if it may hold any.
    #[serde(default)]
    pub phenotypes: Option<Vec<String>>,
    /// Phenotypes to suppress from this file's results.
    #[serde(default)]
    pub ignore_phenos: Vec<String>,
}

/// Deployment-selected configuration: which dataset version is active and
/// which files make it up. Loaded once at startup and injected into the
/// planner; never read from ambient environment mid-query.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub dataset_version: String,
    #[serde(default = "default_cache_budget")]
    pub cache_budget_bytes: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    pub gene_table: Option<PathBuf>,
    #[serde(default, rename = "file")]
    pub files: Vec<FileSpec>,
}

impl DatasetConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DatasetConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PhelixError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| PhelixError::Config(format!("{}: {}", path.display(), e)))
    }
}

struct SourceEntry {
    spec: FileSpec,
    file: Result<Arc<DataFile>>,
}

impl SourceEntry {
    fn covers(&self, phenotypes: &BTreeSet<String>) -> bool {
        match &self.spec.phenotypes {
            None => true,
            Some(own) => own.iter().any(|p| phenotypes.contains(p)),
        }
    }
}

/// Read-only query context for one dataset version.
pub struct Dataset {
    config: DatasetConfig,
    /// Insertion order is the merge tie-break priority.
    sources: IndexMap<String, SourceEntry>,
    resolver: IndexResolver,
    cache: Arc<BlockCache>,
    genes: Option<GeneTable>,
}

impl Dataset {
    /// Open every cataloged file. A file that fails to open stays in the
    /// catalog and is reported as incomplete by queries that select it; a
    /// broken file never takes the dataset down.
    pub fn open(config: DatasetConfig) -> Result<Dataset> {
        let mut sources = IndexMap::new();
        for spec in &config.files {
            if sources.contains_key(&spec.id) {
                return Err(PhelixError::Config(format!(
                    "duplicate source id: {}",
                    spec.id
                )));
            }
            let file = Self::open_source(spec);
            if let Err(e) = &file {
                warn!(source = %spec.id, error = %e, "source failed to open");
            }
            sources.insert(
                spec.id.clone(),
                SourceEntry {
                    spec: spec.clone(),
                    file,
                },
            );
        }
        let genes = match &config.gene_table {
            Some(path) => Some(GeneTable::load(path)?),
            None => None,
        };
        info!(
            version = %config.dataset_version,
            sources = sources.len(),
            "dataset initialized"
        );
        Ok(Dataset {
            cache: Arc::new(BlockCache::new(config.cache_budget_bytes)),
            resolver: IndexResolver::new(),
            sources,
            genes,
            config,
        })
    }

    fn open_source(spec: &FileSpec) -> Result<Arc<DataFile>> {
        let file = DataFile::open(
            &spec.id,
            &spec.path,
            spec.index_path.as_deref(),
            spec.ignore_phenos.iter().cloned().collect(),
        )?;
        if file.format_version != spec.format_version {
            return Err(PhelixError::Parse(format!(
                "{}: catalog expects format version {}, file declares {}",
                spec.path.display(),
                spec.format_version,
                file.format_version
            )));
        }
        Ok(Arc::new(file))
    }

    pub fn version(&self) -> &str {
        &self.config.dataset_version
    }

    pub fn max_page_size(&self) -> usize {
        self.config.max_page_size
    }

    /// Sources relevant to a phenotype set, in catalog order. Selection uses
    /// catalog metadata, so files that failed to open are still selected and
    /// surface as incomplete.
    pub fn sources_for(
        &self,
        phenotypes: &BTreeSet<String>,
    ) -> Vec<(String, Result<Arc<DataFile>>)> {
        self.sources
            .iter()
            .filter(|(_, entry)| entry.covers(phenotypes))
            .map(|(id, entry)| (id.clone(), entry.file.clone()))
            .collect()
    }

    pub fn cache(&self) -> Arc<BlockCache> {
        self.cache.clone()
    }

    pub fn resolver(&self) -> &IndexResolver {
        &self.resolver
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Resolve a gene symbol to a padded query range.
    pub fn gene_range(&self, gene: &str, padding: u32) -> Result<GenomicRange> {
        let table = self
            .genes
            .as_ref()
            .ok_or_else(|| PhelixError::QueryInvalid("no gene table configured".to_string()))?;
        table.range(gene, padding)
    }
}
