// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Caching substrate for incremental rebuilds
//!
//! Module steps are keyed by a deterministic hash of their effective inputs;
//! a hit replays the prior output document set instead of executing the
//! module. Concurrent misses on one key perform a single computation
//! (single-flight); other requesters wait on that cell. Caching is a
//! performance optimization only: hash failures degrade to a miss and never
//! fail the run.

mod hash;

pub use hash::{document_fingerprint, module_cache_key, CacheCode};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::document::Document;
use crate::errors::SiteflowResult;

/// Cache statistics for one cache instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

type Cell = Arc<OnceCell<Vec<Document>>>;

/// In-memory, single-flight execution cache
///
/// Lives for the engine's lifetime so entries carry across runs for
/// incremental rebuilds; keys are stable across processes so a persisted
/// layer can be slotted in behind the same interface.
#[derive(Default)]
pub struct ExecutionCache {
    cells: DashMap<String, Cell>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExecutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached output for `key`, or run `compute` exactly once
    /// and publish its result. Concurrent requesters for the same key wait
    /// for that single computation. A failed computation leaves the cell
    /// empty so a later call retries.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> SiteflowResult<Vec<Document>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = SiteflowResult<Vec<Document>>>,
    {
        let cell: Cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(existing) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "cache hit");
            return Ok(existing.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = cell.get_or_try_init(compute).await?;
        Ok(value.clone())
    }

    /// Drop every entry
    pub fn reset(&self) {
        self.cells.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cells.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Explicit registry of active caches, threaded through the engine instead
/// of a process-wide singleton. Holds weak references so dropped caches
/// vanish from the registry on the next sweep.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Mutex<Vec<Weak<ExecutionCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cache: &Arc<ExecutionCache>) {
        let mut caches = self.caches.lock().expect("cache registry poisoned");
        caches.push(Arc::downgrade(cache));
    }

    /// Reset every live registered cache, pruning dead entries
    pub fn reset_all(&self) {
        let mut caches = self.caches.lock().expect("cache registry poisoned");
        caches.retain(|weak| match weak.upgrade() {
            Some(cache) => {
                cache.reset();
                true
            }
            None => false,
        });
    }

    /// Number of live registered caches
    pub fn len(&self) -> usize {
        let caches = self.caches.lock().expect("cache registry poisoned");
        caches.iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
