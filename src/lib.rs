//! # PMTiles Streamer
//!
//! A tile server for PMTiles archives stored in S3-compatible object storage.
//!
//! An archive packs millions of map tiles behind a compact two-level
//! directory. This library locates any tile with at most a few small HTTP
//! range requests (header, root directory, optionally one leaf directory, the
//! tile itself) and serves it without ever downloading the archive.
//!
//! ## Features
//!
//! - **Range-based streaming**: Fetches only the bytes needed for each tile
//! - **Directory caching**: Header and root directory are decoded once per
//!   archive version and shared by all requests; leaf directories sit in an LRU
//! - **Version pinning**: Reads are checked against the archive's ETag, and a
//!   replaced archive is reloaded instead of mixing bytes from two versions
//! - **Raw range passthrough**: Browser clients can read the archive directly
//!   with `Range` requests and CORS
//!
//! ## Architecture
//!
//! - [`io`] - Object store contract, S3 backend and pinned range reader
//! - [`mod@format`] - Header, directory, tile id and compression decoding
//! - [`archive`] - Directory walk and the identity-keyed directory cache
//! - [`tile`] - Tile service orchestrating lookups
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pmtiles_streamer::{create_router, create_s3_client, RouterConfig, S3ObjectStore, TileService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = create_s3_client(None, "us-east-1").await;
//!     let store = S3ObjectStore::new(client, "my-tiles");
//!     let service = TileService::new(store, "planet.pmtiles");
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use archive::{
    read_header, ArchiveIdentity, ArchiveReader, CachedArchiveState, DirectoryCache,
    DEFAULT_LEAF_CACHE_CAPACITY, MAX_DIRECTORY_DEPTH,
};
pub use config::{CheckConfig, Cli, Command, ServeConfig, StorageArgs};
pub use error::{ArchiveError, IoError, RangeError, TileError};
pub use format::{
    decompress, ArchiveHeader, Compression, Directory, DirectoryEntry, TileCoord, TileType,
    HEADER_SIZE, MAX_ZOOM,
};
pub use io::{
    create_s3_client, ByteRange, ObjectData, ObjectInfo, ObjectRangeReader, ObjectStore,
    ObjectStream, RangeReader, S3ObjectStore,
};
pub use server::{
    create_router, parse_range, AppState, ErrorResponse, HealthResponse, RouterConfig,
};
pub use tile::{ArchiveMetadata, TileRequest, TileResponse, TileService};
