//! Per-build cache of compilation results.
//!
//! Entries are keyed by absolute file path and remember which node produced
//! them and the blake3 fingerprint of the source they were computed from. A
//! request whose [`CompilationKey`] matches the stored entry is served without
//! touching the analyzer; anything else recomputes and replaces the entry.
//!
//! Requests for the same file are single-flight: concurrent callers wait on the
//! file's slot while the first one compiles, then see its result.

use ahash::AHashSet;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::diagnostics::Diagnostic;
use crate::error::AnalysisError;
use crate::helpers;
use crate::registry::{ConfigurationNode, NodeId, lock_recovering};

/// Identity of one compilation: same key, same result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilationKey {
    pub file: PathBuf,
    pub node: NodeId,
    pub fingerprint: blake3::Hash,
}

impl CompilationKey {
    pub fn new(file: &Path, node: NodeId, source: &str) -> Self {
        Self {
            file: file.to_path_buf(),
            node,
            fingerprint: helpers::compute_fingerprint(source),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationResult {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

struct CacheEntry {
    node: NodeId,
    fingerprint: blake3::Hash,
    result: Arc<CompilationResult>,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

#[derive(Default)]
pub struct CompilationCache {
    entries: DashMap<PathBuf, Slot>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    invalidations: AtomicUsize,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `file` when its source and owner are
    /// unchanged, otherwise analyze it with `node` and cache the result.
    ///
    /// A failed analysis caches nothing and leaves any previous entry alone.
    pub fn get_or_compile(
        &self,
        file: &Path,
        source: &str,
        node: &ConfigurationNode,
    ) -> Result<Arc<CompilationResult>, AnalysisError> {
        let key = CompilationKey::new(file, node.id(), source);
        let slot: Slot = self.entries.entry(key.file.clone()).or_default().clone();
        let mut slot = lock_recovering(&slot, "compilation cache slot");

        match slot.as_ref() {
            Some(entry) if entry.node == key.node && entry.fingerprint == key.fingerprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("Cache hit for {}", file.display());
                return Ok(entry.result.clone());
            }
            Some(_) => {
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                log::debug!("Source or owner of {} changed; recompiling", file.display());
            }
            None => {}
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let output = node.analyze(file, source)?;
        let result = Arc::new(CompilationResult {
            code: output.code,
            diagnostics: output.diagnostics,
        });
        *slot = Some(CacheEntry {
            node: key.node,
            fingerprint: key.fingerprint,
            result: result.clone(),
        });
        Ok(result)
    }

    /// The cached result for `key`, if one exists and still matches it.
    pub fn get(&self, key: &CompilationKey) -> Option<Arc<CompilationResult>> {
        let slot = self.entries.get(&key.file)?.value().clone();
        let entry = lock_recovering(&slot, "compilation cache slot");
        entry
            .as_ref()
            .filter(|entry| entry.node == key.node && entry.fingerprint == key.fingerprint)
            .map(|entry| entry.result.clone())
    }

    /// Drop every entry whose file is not in `live`. Returns how many went.
    pub fn evict_except(&self, live: &AHashSet<PathBuf>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|file, _| live.contains(file));
        let evicted = before.saturating_sub(self.entries.len());
        self.invalidations.fetch_add(evicted, Ordering::Relaxed);
        evicted
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Entries replaced because their source or owner changed, plus evictions.
    pub invalidations: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
