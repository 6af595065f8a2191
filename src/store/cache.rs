//! Bounded LRU cache of decompressed block payloads, shared across all
//! files and concurrent queries.

use crate::store::block::Block;
use crate::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Identifies one compressed block: catalog file id plus physical offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub file: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub max_bytes: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    /// Number of times a block was actually read and decompressed.
    pub load_count: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<BlockKey, Arc<Block>>,
    access_order: VecDeque<BlockKey>,
    total_bytes: usize,
    hit_count: u64,
    miss_count: u64,
    eviction_count: u64,
    load_count: u64,
}

type FillCell = Arc<OnceLock<Result<Arc<Block>>>>;

/// LRU block cache with single-flight loads.
///
/// Concurrent requests for the same key share one decompression: the first
/// requester fills a per-key cell, later requesters block on it and reuse
/// the result (including a load failure). Payloads are handed out as
/// `Arc<Block>`, so eviction never invalidates a reader mid-block.
pub struct BlockCache {
    max_bytes: usize,
    state: Mutex<Inner>,
    in_flight: DashMap<BlockKey, FillCell>,
}

impl BlockCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(Inner::default()),
            in_flight: DashMap::new(),
        }
    }

    /// Return the cached block for `key`, or run `load` to materialize it.
    pub fn get_or_load<F>(&self, key: BlockKey, load: F) -> Result<Arc<Block>>
    where
        F: FnOnce() -> Result<Block>,
    {
        {
            let mut inner = self.state.lock();
            if let Some(block) = inner.entries.get(&key) {
                let block = block.clone();
                inner.hit_count += 1;
                Self::touch(&mut inner, &key);
                return Ok(block);
            }
            inner.miss_count += 1;
        }

        let cell: FillCell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .value()
            .clone();

        let mut loaded_here = false;
        let result = cell
            .get_or_init(|| {
                // Double-check: a previous holder of this key may have
                // published to the LRU between our miss and acquiring a
                // fresh cell.
                {
                    let mut inner = self.state.lock();
                    if let Some(block) = inner.entries.get(&key) {
                        let block = block.clone();
                        Self::touch(&mut inner, &key);
                        return Ok(block);
                    }
                }
                loaded_here = true;
                load().map(Arc::new)
            })
            .clone();

        if loaded_here {
            let mut inner = self.state.lock();
            inner.load_count += 1;
            if let Ok(block) = &result {
                self.insert_locked(&mut inner, key.clone(), block.clone());
            }
        }
        // Retire the cell only if it is still the registered one (a later
        // request may have installed a fresh cell), and only after the
        // result is published to the LRU so no request can miss both.
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        result
    }

    fn insert_locked(&self, inner: &mut Inner, key: BlockKey, block: Arc<Block>) {
        let size = block.payload.len();
        // Oversized payloads are returned but never cached.
        if size > self.max_bytes / 4 {
            return;
        }
        if inner.entries.contains_key(&key) {
            return;
        }
        while inner.total_bytes + size > self.max_bytes {
            let Some(evict) = inner.access_order.pop_front() else {
                break;
            };
            if let Some(old) = inner.entries.remove(&evict) {
                inner.total_bytes -= old.payload.len();
                inner.eviction_count += 1;
                debug!(file = %evict.file, offset = evict.offset, "evicted block");
            }
        }
        inner.total_bytes += size;
        inner.entries.insert(key.clone(), block);
        inner.access_order.push_back(key);
    }

    fn touch(inner: &mut Inner, key: &BlockKey) {
        inner.access_order.retain(|k| k != key);
        inner.access_order.push_back(key.clone());
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.state.lock();
        CacheStats {
            entries: inner.entries.len(),
            total_bytes: inner.total_bytes,
            max_bytes: self.max_bytes,
            hit_count: inner.hit_count,
            miss_count: inner.miss_count,
            eviction_count: inner.eviction_count,
            load_count: inner.load_count,
        }
    }
}
