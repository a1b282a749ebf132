//! Tile Service for resolving and reading tiles.
//!
//! The TileService is the main entry point for archive requests. It owns the
//! object store handle and the [`DirectoryCache`], and orchestrates:
//! - Coordinate validation
//! - Lazy loading of the archive index (header + root directory)
//! - Directory walk to a byte range
//! - Tile read and decompression
//! - One reload when storage reports a new archive version
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TileService                          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     get_tile()                         │  │
//! │  │  1. Validate coordinate   3. Resolve tile id to range  │  │
//! │  │  2. Get cached index      4. Read + decompress payload │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │           │                         │                        │
//! │           ▼                         ▼                        │
//! │   ┌────────────────┐      ┌────────────────────┐             │
//! │   │ DirectoryCache │      │ ObjectStore (S3)   │             │
//! │   └────────────────┘      └────────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::archive::{
    ArchiveIdentity, CachedArchiveState, DirectoryCache, DEFAULT_LEAF_CACHE_CAPACITY,
};
use crate::error::{ArchiveError, IoError, TileError};
use crate::format::{ArchiveHeader, TileCoord};
use crate::io::{ByteRange, ObjectInfo, ObjectStore, ObjectStream};

// =============================================================================
// Tile Request
// =============================================================================

/// A request for a tile, as received from the client.
///
/// Values are unvalidated; [`TileRequest::coord`] checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    /// Zoom level
    pub zoom: u8,

    /// Tile column, counted from the west edge
    pub x: u64,

    /// Tile row, counted from the north edge
    pub y: u64,
}

impl TileRequest {
    /// Create a new tile request.
    pub fn new(zoom: u8, x: u64, y: u64) -> Self {
        Self { zoom, x, y }
    }

    /// Validate the request into a tile coordinate.
    pub fn coord(&self) -> Result<TileCoord, TileError> {
        TileCoord::new(self.zoom, self.x, self.y)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The tile payload with archive tile compression removed
    pub data: Bytes,

    /// MIME type derived from the archive tile type
    pub content_type: &'static str,

    /// Byte range of the stored payload in the archive
    pub range: ByteRange,

    /// ETag of the archive version the tile came from
    pub etag: Option<String>,
}

/// Decoded header together with the archive's JSON metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveMetadata {
    pub header: ArchiveHeader,
    pub metadata: serde_json::Value,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for resolving and reading tiles from a single archive.
///
/// # Type Parameters
///
/// * `S` - The object store holding the archive (e.g., S3)
///
/// # Example
///
/// ```ignore
/// use pmtiles_streamer::io::{create_s3_client, S3ObjectStore};
/// use pmtiles_streamer::tile::{TileRequest, TileService};
///
/// let client = create_s3_client(None, "us-east-1").await;
/// let store = S3ObjectStore::new(client, "tiles-bucket");
/// let service = TileService::new(store, "planet.pmtiles");
///
/// let tile = service.get_tile(TileRequest::new(12, 3423, 1763)).await?;
/// ```
pub struct TileService<S: ObjectStore> {
    /// Storage backend
    store: Arc<S>,

    /// Object key of the served archive
    key: String,

    /// Decoded index of the current archive version
    cache: DirectoryCache<CachedArchiveState<S>>,

    /// Leaf directories kept per archive version
    leaf_cache_capacity: NonZeroUsize,
}

impl<S: ObjectStore + 'static> TileService<S> {
    /// Create a new TileService with the default leaf cache capacity.
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self::with_shared_store(Arc::new(store), key)
    }

    /// Create a new TileService over a shared store.
    pub fn with_shared_store(store: Arc<S>, key: impl Into<String>) -> Self {
        Self::with_leaf_cache_capacity(store, key, DEFAULT_LEAF_CACHE_CAPACITY)
    }

    /// Create a new TileService with a custom leaf cache capacity.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_leaf_cache_capacity(
        store: Arc<S>,
        key: impl Into<String>,
        leaf_cache_capacity: usize,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            cache: DirectoryCache::new(),
            leaf_cache_capacity: NonZeroUsize::new(leaf_cache_capacity)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Object key of the served archive.
    pub fn archive_key(&self) -> &str {
        &self.key
    }

    /// Last path segment of the archive key (e.g. `planet.pmtiles`).
    pub fn object_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Storage location for log messages.
    pub fn location(&self) -> String {
        self.store.location(&self.key)
    }

    /// The directory cache (for diagnostics and tests).
    pub fn cache(&self) -> &DirectoryCache<CachedArchiveState<S>> {
        &self.cache
    }

    /// Get a tile, resolving its coordinate through the archive directories.
    ///
    /// # Errors
    ///
    /// - `CoordinateOutOfRange` if `x`/`y` fall outside the zoom level
    /// - `ZoomOutOfRange` if the zoom is outside the archive's bounds
    /// - `NotFound` if no directory entry covers the tile
    /// - `Archive` if storage fails or the archive is corrupt
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileResponse, TileError> {
        let coord = request.coord()?;

        let response = self
            .with_state(move |state| async move {
                let archive = state.archive();
                let range = archive.resolve_tile(state.reader(), coord).await?;
                let data = archive.read_tile_bytes(state.reader(), range).await?;
                Ok::<_, TileError>(TileResponse {
                    data,
                    content_type: state.header().tile_type.content_type(),
                    range,
                    etag: state.identity().etag.clone(),
                })
            })
            .await?;

        debug!(
            tile = %coord,
            offset = response.range.offset,
            length = response.range.length,
            "Served tile"
        );

        Ok(response)
    }

    /// Resolve a tile coordinate to its absolute byte range without reading it.
    pub async fn resolve_tile(&self, coord: TileCoord) -> Result<ByteRange, TileError> {
        self.with_state(move |state| async move {
            state.archive().resolve_tile(state.reader(), coord).await
        })
        .await
    }

    /// Decoded header of the current archive version.
    pub async fn header(&self) -> Result<ArchiveHeader, ArchiveError> {
        Ok(self.state().await?.header().clone())
    }

    /// Header plus the decompressed JSON metadata blob.
    ///
    /// An archive with no metadata reports an empty JSON object.
    pub async fn metadata(&self) -> Result<ArchiveMetadata, ArchiveError> {
        self.with_state(|state| async move {
            let raw = state.archive().read_metadata(state.reader()).await?;
            Ok::<_, ArchiveError>(ArchiveMetadata {
                header: state.header().clone(),
                metadata: parse_metadata(&raw)?,
            })
        })
        .await
    }

    /// Size and ETag of the archive object, straight from storage.
    ///
    /// This does not touch the directory cache.
    pub async fn object_info(&self) -> Result<ObjectInfo, IoError> {
        self.store.head(&self.key).await
    }

    /// Stream raw archive bytes, either the whole object or one range.
    pub async fn read_raw(&self, range: Option<ByteRange>) -> Result<ObjectStream, IoError> {
        self.store.get_stream(&self.key, range).await
    }

    /// Get the cached index, loading it on first use.
    async fn state(&self) -> Result<Arc<CachedArchiveState<S>>, ArchiveError> {
        let requested = ArchiveIdentity::latest(&self.key);
        self.cache
            .get(&requested, || async move {
                let state = CachedArchiveState::load(
                    Arc::clone(&self.store),
                    &self.key,
                    self.leaf_cache_capacity,
                )
                .await?;
                Ok::<_, ArchiveError>((state.identity().clone(), state))
            })
            .await
    }

    /// Run `op` against the cached state, reloading once if the archive changed.
    async fn with_state<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: Fn(Arc<CachedArchiveState<S>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ArchiveError> + ArchiveChange,
    {
        let state = self.state().await?;
        let identity = state.identity().clone();

        match op(state).await {
            Err(err) if err.is_archive_changed() => {
                warn!(
                    identity = %identity,
                    "Archive changed in storage, reloading index"
                );
                self.cache.invalidate(&identity).await;
                let state = self.state().await?;
                op(state).await
            }
            result => result,
        }
    }
}

/// Errors that can report a changed archive version.
trait ArchiveChange {
    fn is_archive_changed(&self) -> bool;
}

impl ArchiveChange for ArchiveError {
    fn is_archive_changed(&self) -> bool {
        ArchiveError::is_archive_changed(self)
    }
}

impl ArchiveChange for TileError {
    fn is_archive_changed(&self) -> bool {
        TileError::is_archive_changed(self)
    }
}

/// Parse the decompressed metadata blob as JSON.
fn parse_metadata(raw: &[u8]) -> Result<serde_json::Value, ArchiveError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(raw).map_err(|e| ArchiveError::InvalidMetadata(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
