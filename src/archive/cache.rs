//! Single-entry, identity-keyed cache for the decoded archive index.
//!
//! The server serves exactly one archive at a time, so the cache holds at
//! most one value. It is keyed by [`ArchiveIdentity`]: the storage key plus
//! the change token (ETag) observed when the value was loaded.
//!
//! # Invalidation
//!
//! - A request naming a different key, or a specific ETag that differs from
//!   the cached one, replaces the entry.
//! - [`DirectoryCache::invalidate`] drops the entry if (and only if) it still
//!   holds the given identity, so a caller reporting a stale version cannot
//!   evict a fresher one loaded in the meantime.
//!
//! # Concurrency
//!
//! Reads take a shared lock and clone an `Arc`. Loads are serialised behind a
//! separate mutex and re-check the entry after acquiring it, so a cold-start
//! burst of requests performs the load once.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

// =============================================================================
// ArchiveIdentity
// =============================================================================

/// Identifies one version of a stored archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveIdentity {
    /// Object key in the bucket
    pub key: String,

    /// Change token reported by storage; `None` when unknown or unsupported
    pub etag: Option<String>,
}

impl ArchiveIdentity {
    /// Identity of whatever version is currently stored under `key`.
    pub fn latest(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            etag: None,
        }
    }

    /// Identity of a specific version.
    pub fn new(key: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            key: key.into(),
            etag,
        }
    }

    /// Whether a value loaded for `self` can answer a request for `requested`.
    ///
    /// A request without an ETag accepts any cached version of the same key.
    pub fn satisfies(&self, requested: &ArchiveIdentity) -> bool {
        self.key == requested.key
            && (requested.etag.is_none() || requested.etag == self.etag)
    }
}

impl fmt::Display for ArchiveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.etag {
            Some(etag) => write!(f, "{}@{}", self.key, etag),
            None => f.write_str(&self.key),
        }
    }
}

// =============================================================================
// DirectoryCache
// =============================================================================

/// Cache holding at most one loaded value and the identity it was loaded for.
pub struct DirectoryCache<T> {
    entry: RwLock<Option<(ArchiveIdentity, Arc<T>)>>,
    load_lock: Mutex<()>,
    loads: AtomicU64,
}

impl<T> DirectoryCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entry: RwLock::new(None),
            load_lock: Mutex::new(()),
            loads: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `identity`, loading it on a miss.
    ///
    /// `loader` returns the value together with the identity it actually
    /// observed (e.g. the ETag from a HEAD request), which becomes the cache
    /// key. Loader errors are returned as-is and leave the cache untouched.
    pub async fn get<F, Fut, E>(&self, identity: &ArchiveIdentity, loader: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(ArchiveIdentity, T), E>>,
    {
        if let Some(value) = self.lookup(identity).await {
            return Ok(value);
        }

        let _guard = self.load_lock.lock().await;

        // Another task may have finished the load while we waited
        if let Some(value) = self.lookup(identity).await {
            return Ok(value);
        }

        let (loaded_identity, value) = loader().await?;
        let value = Arc::new(value);
        self.loads.fetch_add(1, Ordering::Relaxed);

        let previous = self
            .entry
            .write()
            .await
            .replace((loaded_identity.clone(), Arc::clone(&value)));

        match previous {
            Some((old, _)) if old != loaded_identity => {
                info!(old = %old, new = %loaded_identity, "Replaced cached archive index");
            }
            _ => debug!(identity = %loaded_identity, "Cached archive index"),
        }

        Ok(value)
    }

    /// Drop the entry if it was loaded for exactly `identity`.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn invalidate(&self, identity: &ArchiveIdentity) -> bool {
        let mut entry = self.entry.write().await;
        match entry.as_ref() {
            Some((current, _)) if current == identity => {
                info!(identity = %identity, "Invalidated cached archive index");
                *entry = None;
                true
            }
            _ => false,
        }
    }

    /// Identity of the cached entry, if any.
    pub async fn current_identity(&self) -> Option<ArchiveIdentity> {
        self.entry.read().await.as_ref().map(|(id, _)| id.clone())
    }

    /// Number of completed loads since creation.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    async fn lookup(&self, identity: &ArchiveIdentity) -> Option<Arc<T>> {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some((cached, value)) if cached.satisfies(identity) => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

impl<T> Default for DirectoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
