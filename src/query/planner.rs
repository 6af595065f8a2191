//! Translates client queries into file selection, cursor construction, and
//! paged merge execution.

use crate::dataset::Dataset;
use crate::genome::{AssociationRecord, GenomicRange, Variant};
use crate::query::cursor::{CursorState, FileCursor};
use crate::query::merge::{MergeIter, RecordFilter};
use crate::store::DataFile;
use crate::{PhelixError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub range: GenomicRange,
    /// Exact-allele restriction for variant queries.
    pub alleles: Option<(String, String)>,
    pub phenotypes: BTreeSet<String>,
    pub page_size: usize,
    pub cursor: Option<String>,
}

impl QueryRequest {
    pub fn over_range<I, S>(range: GenomicRange, phenotypes: I) -> QueryRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryRequest {
            range,
            alleles: None,
            phenotypes: phenotypes.into_iter().map(Into::into).collect(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }

    pub fn for_variant<I, S>(variant: &Variant, phenotypes: I) -> QueryRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = Self::over_range(variant.range(), phenotypes);
        request.alleles = Some((variant.ref_allele.clone(), variant.alt_allele.clone()));
        request
    }

    pub fn with_page_size(mut self, page_size: usize) -> QueryRequest {
        self.page_size = page_size;
        self
    }

    pub fn with_cursor<S: Into<String>>(mut self, token: S) -> QueryRequest {
        self.cursor = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub records: Vec<AssociationRecord>,
    /// Absent when the sequence is exhausted.
    pub next_cursor: Option<String>,
    /// Sources that could not contribute fully to this page.
    pub incomplete_sources: Vec<String>,
}

/// Executes queries against one dataset version.
pub struct QueryPlanner<'a> {
    dataset: &'a Dataset,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(dataset: &'a Dataset) -> QueryPlanner<'a> {
        QueryPlanner { dataset }
    }

    /// Run one page of `request`.
    ///
    /// Per-source failures (missing or corrupt index, corrupt or truncated
    /// blocks, undecodable records) drop that source and list it in
    /// `incomplete_sources`; they never fail the query. `QueryInvalid` and
    /// `CursorInvalid` are returned before any file access.
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
        Self::validate(request)?;
        let page_size = request.page_size.min(self.dataset.max_page_size());
        let selected = self.dataset.sources_for(&request.phenotypes);
        let resume = request
            .cursor
            .as_deref()
            .map(|token| Self::decode_cursor(token, self.dataset.version(), &selected))
            .transpose()?;

        let mut incomplete: Vec<String> = Vec::new();
        let mut merge = MergeIter::new(RecordFilter {
            phenotypes: request.phenotypes.clone(),
            alleles: request.alleles.clone(),
        });

        for (id, file) in &selected {
            let file: Arc<DataFile> = match file {
                Ok(file) => file.clone(),
                Err(e) => {
                    warn!(source = %id, error = %e, "source unusable");
                    incomplete.push(id.clone());
                    continue;
                }
            };
            let cursor = match &resume {
                Some(state) => match state.positions.iter().find(|(sid, _)| sid == id) {
                    // Absent from the cursor: exhausted or dropped in an
                    // earlier page.
                    None => continue,
                    Some((_, voffset)) => FileCursor::resume(
                        file,
                        self.dataset.cache(),
                        self.dataset.resolver(),
                        request.range,
                        *voffset,
                    ),
                },
                None => FileCursor::open(
                    file,
                    self.dataset.cache(),
                    self.dataset.resolver(),
                    request.range,
                ),
            };
            match cursor {
                Ok(cursor) => merge.push_source(id, cursor),
                Err(e) if e.is_source_scoped() => {
                    warn!(source = %id, error = %e, "source dropped");
                    incomplete.push(id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        // Resumed pages must continue at or after the cursor's last emitted
        // coordinate; an earlier record means the files changed underneath
        // the cursor.
        let floor = resume.as_ref().and_then(|state| state.last);
        let mut records = Vec::new();
        while records.len() < page_size {
            match merge.next() {
                Some(record) => {
                    if let Some(floor) = floor {
                        if (record.chrom, record.pos) < floor {
                            return Err(PhelixError::CursorInvalid(
                                "cursor does not match the current data files".to_string(),
                            ));
                        }
                    }
                    records.push(record);
                }
                None => break,
            }
        }

        let next_cursor = if merge.is_active() {
            let state = CursorState {
                dataset_version: self.dataset.version().to_string(),
                last: records.last().map(|r| (r.chrom, r.pos)).or(floor),
                positions: merge.positions(),
            };
            Some(state.encode()?)
        } else {
            None
        };

        incomplete.extend(merge.failures().iter().map(|(id, _)| id.clone()));
        incomplete.sort();
        incomplete.dedup();

        Ok(QueryResponse {
            records,
            next_cursor,
            incomplete_sources: incomplete,
        })
    }

    fn validate(request: &QueryRequest) -> Result<()> {
        let invalid = |reason: &str| Err(PhelixError::QueryInvalid(reason.to_string()));
        if request.range.start == 0 {
            return invalid("coordinates are 1-based");
        }
        if request.range.start > request.range.end {
            return invalid("range start is past range end");
        }
        if request.phenotypes.is_empty() {
            return invalid("no phenotypes requested");
        }
        if request.page_size == 0 {
            return invalid("page size must be positive");
        }
        Ok(())
    }

    fn decode_cursor(
        token: &str,
        dataset_version: &str,
        selected: &[(String, Result<Arc<DataFile>>)],
    ) -> Result<CursorState> {
        let state = CursorState::decode(token)?;
        if state.dataset_version != dataset_version {
            return Err(PhelixError::CursorInvalid(format!(
                "cursor is for dataset version {}, current is {}",
                state.dataset_version, dataset_version
            )));
        }
        for (id, _) in &state.positions {
            if !selected.iter().any(|(sid, _)| sid == id) {
                return Err(PhelixError::CursorInvalid(format!(
                    "cursor references unknown source {}",
                    id
                )));
            }
        }
        Ok(state)
    }
}
