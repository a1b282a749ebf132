//! Tile service layer.
//!
//! The tile service sits between the HTTP layer and the archive:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  coordinate → tile id → byte range      │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │    DirectoryCache / ArchiveReader       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Main entry point for tile, metadata and raw requests
//! - [`TileRequest`]: Unvalidated `(z, x, y)` from the client
//! - [`TileResponse`]: Tile payload with content type and source range
//! - [`ArchiveMetadata`]: Header plus the archive's JSON metadata

mod service;

pub use service::{ArchiveMetadata, TileRequest, TileResponse, TileService};
