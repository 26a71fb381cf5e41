//! Bounded, persistent cache of already-seen record identifiers
//!
//! The cache is the dedup authority for the whole pipeline: an identifier is
//! downloaded at most once as long as it stays inside the cache window.
//! Membership is exact (ordered set, not a probabilistic filter) because a
//! false positive here would silently drop data.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk representation. Round-trips exactly: capacity plus the full
/// identifier sequence, oldest first.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    capacity: usize,
    ids: Vec<String>,
}

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "IO error: {}", e),
            CacheError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Fixed-capacity, insertion-ordered set of identifiers with FIFO eviction.
///
/// Invariants after any mutation: `len() <= capacity()`, no duplicates.
/// The `order` deque holds identifiers oldest-first; `index` mirrors it for
/// O(1) membership checks.
pub struct SeenCache {
    path: PathBuf,
    capacity: usize,
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl SeenCache {
    /// Load prior state from `path`, or start empty.
    ///
    /// A missing or corrupt file is not fatal: a cold cache only degrades to
    /// possible re-downloads, never to data loss. If the persisted capacity
    /// differs from `capacity`, the cache is resized (truncating from the
    /// oldest end) before being returned.
    pub fn load(path: impl AsRef<Path>, capacity: usize) -> Self {
        let path = path.as_ref().to_path_buf();

        let persisted = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PersistedCache>(&raw) {
                Ok(persisted) => Some(persisted),
                Err(e) => {
                    log::warn!(
                        "Corrupt seen cache at {}, starting empty: {}",
                        path.display(),
                        e
                    );
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!(
                    "Unreadable seen cache at {}, starting empty: {}",
                    path.display(),
                    e
                );
                None
            }
        };

        match persisted {
            Some(persisted) => {
                let mut cache = Self::empty(path, persisted.capacity.max(1));
                for id in persisted.ids {
                    cache.add(id);
                }
                if cache.capacity != capacity {
                    log::info!(
                        "Seen cache capacity changed {} -> {}, resizing",
                        cache.capacity,
                        capacity
                    );
                    cache.resize(capacity);
                }
                cache
            }
            None => Self::empty(path, capacity),
        }
    }

    fn empty(path: PathBuf, capacity: usize) -> Self {
        Self {
            path,
            capacity,
            order: VecDeque::with_capacity(capacity.min(4096)),
            index: HashSet::new(),
        }
    }

    /// Exact membership test.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Append `id` at the newest end; no-op if already present. Evicts from
    /// the oldest end until the length is back within capacity.
    pub fn add(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.index.contains(&id) {
            return;
        }
        self.index.insert(id.clone());
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
    }

    /// Change the capacity, truncating from the oldest end if shrinking.
    pub fn resize(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Identifiers oldest-first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Persist the full cache state, overwriting any prior file.
    ///
    /// Writes to a temporary sibling and renames it into place so an
    /// interrupted write never leaves a half-written file that would parse
    /// on the next load.
    pub fn flush(&self) -> Result<(), CacheError> {
        let persisted = PersistedCache {
            capacity: self.capacity,
            ids: self.order.iter().cloned().collect(),
        };
        let json = serde_json::to_string(&persisted)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        log::debug!(
            "Persisted seen cache ({} entries) to {}",
            self.order.len(),
            self.path.display()
        );
        Ok(())
    }
}
