//! HTTP request handlers for the PMTiles Streamer API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.pbf` - Serve a tile
//! - `GET /metadata` - Archive header and JSON metadata
//! - `GET /health` - Archive reachability, size and ETag
//! - `GET /` and `GET /{object_name}` - Raw archive bytes, honouring `Range`
//!
//! Every route also answers `HEAD`. On the raw archive routes a HEAD is
//! answered from object metadata alone.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{ArchiveError, IoError, RangeError, TileError};
use crate::format::MAX_ZOOM;
use crate::io::{ByteRange, ObjectInfo, ObjectStore, ObjectStream};
use crate::tile::{ArchiveMetadata, TileRequest, TileService};

use super::range::{content_range, parse_range};

/// Default Cache-Control max-age for tiles and archive bytes (1 day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86_400;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: ObjectStore> {
    /// The tile service for the served archive
    pub tile_service: Arc<TileService<S>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<S: ObjectStore + 'static> AppState<S> {
    /// Create a new application state with the default cache max-age.
    pub fn new(tile_service: TileService<S>) -> Self {
        Self::with_cache_max_age(tile_service, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService<S>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }

    fn cache_control(&self) -> String {
        format!("public, max-age={}, immutable", self.cache_max_age)
    }
}

impl<S: ObjectStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{z}/{x}/{filename}`
/// where filename must be `{y}.pbf`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Zoom level
    pub z: String,

    /// Tile column
    pub x: String,

    /// Tile row with the `.pbf` extension
    pub filename: String,
}

impl TilePathParams {
    /// Parse the path into a tile request.
    ///
    /// Returns `None` unless the path is exactly `{z}/{x}/{y}.pbf` with
    /// decimal segments. Numbers too large for the tile grid become an
    /// out-of-range tile.
    pub fn to_request(&self) -> Option<Result<TileRequest, TileError>> {
        let y = self.filename.strip_suffix(".pbf")?;

        let z = parse_segment(&self.z)?;
        let x = parse_segment(&self.x)?;
        let y = parse_segment(y)?;

        if z > u64::from(MAX_ZOOM) {
            return Some(Err(TileError::CoordinateOutOfRange {
                zoom: u8::try_from(z).unwrap_or(u8::MAX),
                x,
                y,
            }));
        }

        Some(Ok(TileRequest::new(z as u8, x, y)))
    }
}

/// Parse an all-digit path segment. Values past `u64::MAX` saturate.
fn parse_segment(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(value.parse().unwrap_or(u64::MAX))
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "tile_not_found", "invalid_range")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok", "not_found" or "unavailable"
    pub status: String,

    /// File name of the served archive
    pub object_name: String,

    /// Archive size in bytes, when reachable
    pub size: Option<u64>,

    /// Archive ETag, when reachable and reported by storage
    pub etag: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build a JSON error response and log it by severity.
///
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

fn io_status(err: &IoError) -> (StatusCode, &'static str) {
    match err {
        IoError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        IoError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection_error"),
        IoError::S3(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        IoError::ArchiveChanged { .. } => (StatusCode::SERVICE_UNAVAILABLE, "archive_changed"),
        IoError::RangeOutOfBounds { .. } | IoError::ShortRead { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "io_error")
        }
    }
}

fn archive_status(err: &ArchiveError) -> (StatusCode, &'static str) {
    match err {
        ArchiveError::Io(io_err) => io_status(io_err),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_archive"),
    }
}

impl IntoResponse for IoError {
    fn into_response(self) -> Response {
        let (status, error_type) = io_status(&self);
        error_response(status, error_type, self.to_string())
    }
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let (status, error_type) = archive_status(&self);
        error_response(status, error_type, self.to_string())
    }
}

/// Convert TileError to HTTP response.
///
/// Missing tiles and coordinates outside the archive are both not-found.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::NotFound { .. } => (StatusCode::NOT_FOUND, "tile_not_found"),
            TileError::ZoomOutOfRange { .. }
            | TileError::CoordinateOutOfRange { .. }
            | TileError::TileIdOutOfRange(_) => (StatusCode::NOT_FOUND, "out_of_range"),
            TileError::Archive(archive_err) => archive_status(archive_err),
        };
        error_response(status, error_type, self.to_string())
    }
}

/// Convert RangeError to a 416 response.
///
/// Unsatisfiable ranges carry `Content-Range: bytes */{total}`.
impl IntoResponse for RangeError {
    fn into_response(self) -> Response {
        let total = match &self {
            RangeError::Unsatisfiable { total, .. } => Some(*total),
            RangeError::Malformed(_) => None,
        };

        let mut response = error_response(
            StatusCode::RANGE_NOT_SATISFIABLE,
            "invalid_range",
            self.to_string(),
        );
        if let Some(total) = total {
            set_header(
                response.headers_mut(),
                header::CONTENT_RANGE,
                &format!("bytes */{total}"),
            );
        }
        response
    }
}

/// Error type returned by all handlers.
#[derive(Debug)]
pub enum HandlerError {
    Tile(TileError),
    Archive(ArchiveError),
    Io(IoError),
    Range(RangeError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Tile(err) => err.into_response(),
            HandlerError::Archive(err) => err.into_response(),
            HandlerError::Io(err) => err.into_response(),
            HandlerError::Range(err) => err.into_response(),
        }
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError::Tile(err)
    }
}

impl From<ArchiveError> for HandlerError {
    fn from(err: ArchiveError) -> Self {
        HandlerError::Archive(err)
    }
}

impl From<IoError> for HandlerError {
    fn from(err: IoError) -> Self {
        HandlerError::Io(err)
    }
}

impl From<RangeError> for HandlerError {
    fn from(err: RangeError) -> Self {
        HandlerError::Range(err)
    }
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{z}/{x}/{y}.pbf`
///
/// # Response
///
/// - `200 OK`: Tile payload, `Content-Type` from the archive tile type
/// - `404 Not Found`: Tile absent or outside the archive's zoom/grid, or a
///   path that is not `{z}/{x}/{y}.pbf` (unknown route)
/// - `5xx`: Storage failure or corrupt archive
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}, immutable`
/// - `ETag` of the archive version (when storage reports one)
pub async fn tile_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    method: Method,
    uri: Uri,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let Some(request) = params.to_request() else {
        return Ok(unknown_route(&state, &method, &uri));
    };
    let tile = state.tile_service.get_tile(request?).await?;

    let mut headers = HeaderMap::new();
    set_header(&mut headers, header::CONTENT_TYPE, tile.content_type);
    set_header(&mut headers, header::CACHE_CONTROL, &state.cache_control());
    if let Some(etag) = &tile.etag {
        set_header(&mut headers, header::ETAG, etag);
    }

    Ok((StatusCode::OK, headers, Body::from(tile.data)).into_response())
}

/// Handle metadata requests.
///
/// # Endpoint
///
/// `GET /metadata`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "header": { "specVersion": 3, "minZoom": 0, "maxZoom": 14, ... },
///   "metadata": { "name": "...", "vector_layers": [...] }
/// }
/// ```
pub async fn metadata_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ArchiveMetadata>, HandlerError> {
    Ok(Json(state.tile_service.metadata().await?))
}

/// Handle health check requests.
///
/// Issues a HEAD against storage; the archive header is not parsed.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "objectName": "planet.pmtiles",
///   "size": 123456789,
///   "etag": "\"9b2cf535f27731c974343645a3985328\""
/// }
/// ```
pub async fn health_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let service = &state.tile_service;
    let object_name = service.object_name().to_string();

    let response = match service.object_info().await {
        Ok(info) => HealthResponse {
            status: "ok".to_string(),
            object_name,
            size: Some(info.size),
            etag: info.etag,
        },
        Err(err) => {
            let status = match &err {
                IoError::NotFound(_) => "not_found",
                _ => "unavailable",
            };
            warn!(archive = %service.location(), error = %err, "Health check failed");
            HealthResponse {
                status: status.to_string(),
                object_name,
                size: None,
                etag: None,
            }
        }
    };

    Json(response)
}

/// Handle raw archive requests at `/`.
///
/// # Endpoint
///
/// `GET /` with optional `Range: bytes=<start>-<end?>`
///
/// # Response
///
/// - `200 OK`: The whole archive, streamed from storage
/// - `206 Partial Content`: The requested range, with `Content-Range`
/// - `404 Not Found`: Archive object absent
/// - `416 Range Not Satisfiable`: Malformed or out-of-bounds range
/// - `503 Service Unavailable`: Archive replaced between size check and read
///
/// `HEAD` returns the same status and headers from a storage HEAD, without
/// reading any archive bytes.
///
/// # Headers
///
/// - `Accept-Ranges: bytes`
/// - `Content-Length`
/// - `ETag` (when storage reports one)
/// - `Cache-Control: public, max-age={cache_max_age}, immutable`
pub async fn archive_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let service = &state.tile_service;

    let range_value = headers
        .get(header::RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| RangeError::Malformed("header is not valid ASCII".to_string()))
        })
        .transpose()?;

    if method == Method::HEAD {
        let info = service.object_info().await?;
        let range = range_value
            .map(|value| parse_range(value, info.size))
            .transpose()?;
        return Ok(head_response(&state, &info, range));
    }

    let Some(value) = range_value else {
        let object = service.read_raw(None).await?;
        debug!(archive = %service.location(), size = object.size, "Serving full archive");
        let headers = raw_headers(&state, object.etag.as_deref(), object.length, None);
        return Ok((StatusCode::OK, headers, Body::from_stream(object.body)).into_response());
    };

    let info = service.object_info().await?;
    let range = parse_range(value, info.size)?;
    let object = service.read_raw(Some(range)).await?;
    check_same_version(&info, &object)?;

    if object.length != range.length {
        return Err(IoError::ShortRead {
            offset: range.offset,
            expected: range.length,
            actual: object.length,
        }
        .into());
    }

    debug!(
        archive = %service.location(),
        offset = range.offset,
        length = range.length,
        "Serving archive range"
    );

    let headers = raw_headers(
        &state,
        object.etag.as_deref(),
        range.length,
        Some(content_range(range, info.size)),
    );
    Ok((
        StatusCode::PARTIAL_CONTENT,
        headers,
        Body::from_stream(object.body),
    )
        .into_response())
}

/// The ranged GET must come from the same object version as the HEAD that
/// sized the range.
fn check_same_version(info: &ObjectInfo, object: &ObjectStream) -> Result<(), IoError> {
    if let (Some(expected), Some(actual)) = (&info.etag, &object.etag) {
        if expected != actual {
            return Err(IoError::ArchiveChanged {
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
    }
    Ok(())
}

fn head_response<S: ObjectStore + 'static>(
    state: &AppState<S>,
    info: &ObjectInfo,
    range: Option<ByteRange>,
) -> Response {
    let (status, length, content_range) = match range {
        Some(range) => (
            StatusCode::PARTIAL_CONTENT,
            range.length,
            Some(content_range(range, info.size)),
        ),
        None => (StatusCode::OK, info.size, None),
    };

    let headers = raw_headers(state, info.etag.as_deref(), length, content_range);
    (status, headers, Body::empty()).into_response()
}

fn raw_headers<S: ObjectStore + 'static>(
    state: &AppState<S>,
    etag: Option<&str>,
    length: u64,
    content_range: Option<String>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    set_header(&mut headers, header::CONTENT_TYPE, "application/octet-stream");
    set_header(&mut headers, header::CONTENT_LENGTH, &length.to_string());
    set_header(&mut headers, header::ACCEPT_RANGES, "bytes");
    set_header(&mut headers, header::CACHE_CONTROL, &state.cache_control());
    if let Some(etag) = etag {
        set_header(&mut headers, header::ETAG, etag);
    }
    if let Some(content_range) = content_range {
        set_header(&mut headers, header::CONTENT_RANGE, &content_range);
    }
    headers
}

/// Handle every path no route matched.
///
/// `GET /{object_name}` (or the full archive key) serves the raw archive;
/// anything else is a 404 listing the valid routes.
pub async fn fallback_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let service = &state.tile_service;
    let names_archive = path == service.object_name() || path == service.archive_key();

    if names_archive && (method == Method::GET || method == Method::HEAD) {
        return match archive_handler(State(state.clone()), method, headers).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
    }

    unknown_route(&state, &method, &uri)
}

/// 404 listing the valid routes.
fn unknown_route<S: ObjectStore + 'static>(
    state: &AppState<S>,
    method: &Method,
    uri: &Uri,
) -> Response {
    let message = format!(
        "No route for {} {}. Valid routes: GET /tiles/{{z}}/{{x}}/{{y}}.pbf, GET /metadata, \
         GET /health, GET / or GET /{}",
        method,
        uri.path(),
        state.tile_service.object_name()
    );
    error_response(StatusCode::NOT_FOUND, "unknown_route", message)
}

// =============================================================================
// Tests
// =============================================================================
