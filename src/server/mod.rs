//! HTTP server layer for PMTiles Streamer.
//!
//! This module provides the HTTP API for serving tiles and raw byte ranges
//! from a single archive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /tiles/{z}/{x}/{y}.pbf   GET /{object_name} + Range     │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    range    │  │        routes           │  │
//! │  │ (requests)  │  │ (bytes=a-b) │  │  (router config, CORS)  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod range;
pub mod routes;

pub use handlers::{
    archive_handler, fallback_handler, health_handler, metadata_handler, tile_handler, AppState,
    ErrorResponse, HandlerError, HealthResponse, TilePathParams, DEFAULT_CACHE_MAX_AGE,
};
pub use range::{content_range, parse_range};
pub use routes::{create_router, RouterConfig};
