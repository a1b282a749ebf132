//! Directory cache and resolution integration tests.
//!
//! Tests verify:
//! - Header and root directory are fetched once and shared
//! - Leaf directories are fetched once per archive version
//! - Concurrent requests don't cause duplicate index loads
//! - A replaced archive is detected and reloaded exactly once
//! - Raw range reads never mix two archive versions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pmtiles_streamer::error::{ArchiveError, IoError, TileError};
use pmtiles_streamer::format::{DirectoryEntry, TileCoord};
use pmtiles_streamer::io::{ByteRange, ObjectData, ObjectInfo, ObjectStore};
use pmtiles_streamer::tile::{TileRequest, TileService};
use pmtiles_streamer::{create_router, RouterConfig};

use super::test_utils::{
    encode_directory, gzip, numbered_tiles, shared_store, simple_archive, tile_payload,
    ArchiveBuilder, MockObjectStore, ARCHIVE_KEY,
};

fn service_for(store: &Arc<MockObjectStore>) -> TileService<MockObjectStore> {
    TileService::with_shared_store(Arc::clone(store), ARCHIVE_KEY)
}

fn request_for(tile_id: u64) -> TileRequest {
    let coord = TileCoord::from_tile_id(tile_id).unwrap();
    TileRequest::new(coord.zoom, u64::from(coord.x), u64::from(coord.y))
}

/// Root pointing at a single leaf that holds tile ids `ids`.
fn leaf_archive(ids: std::ops::Range<u64>, gzip_internal: bool) -> Vec<u8> {
    let (entries, tiles) = numbered_tiles(ids);
    let mut leaf = encode_directory(&entries);
    if gzip_internal {
        leaf = gzip(&leaf);
    }

    let builder = ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(0, 0, leaf.len() as u32, 0)])
        .leaves(leaf)
        .tiles(tiles);
    if gzip_internal {
        builder.gzip_internal().build()
    } else {
        builder.build()
    }
}

// =============================================================================
// Index Caching
// =============================================================================

#[tokio::test]
async fn test_index_loaded_once_across_requests() {
    let store = shared_store(simple_archive());
    let service = service_for(&store);

    let first = service.get_tile(request_for(5)).await.unwrap();
    let second = service.get_tile(request_for(3)).await.unwrap();
    assert_eq!(first.data, tile_payload(5));
    assert_eq!(second.data, tile_payload(3));

    // One HEAD, then header + root + two tile reads
    assert_eq!(store.head_count(), 1);
    assert_eq!(store.get_count(), 4);
    assert_eq!(service.cache().load_count(), 1);
}

#[tokio::test]
async fn test_header_and_root_are_separate_ranged_reads() {
    let store = shared_store(simple_archive());
    let service = service_for(&store);

    service.get_tile(request_for(0)).await.unwrap();

    let ranges = store.requested_ranges();
    assert_eq!(ranges[0], Some(ByteRange::new(0, 127)));
    assert_eq!(ranges[1].map(|r| r.offset), Some(127));
    assert!(ranges.iter().all(Option::is_some));
}

#[tokio::test]
async fn test_resolution_adds_tile_data_offset() {
    let archive = ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(5, 0, 50, 1)])
        .tiles(vec![7u8; 50])
        .tile_data_offset(300)
        .build();
    let store = shared_store(archive);
    let service = service_for(&store);

    let range = service
        .resolve_tile(TileCoord::new(2, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(range, ByteRange::new(300, 50));

    let missing = service.resolve_tile(TileCoord::new(2, 1, 0).unwrap()).await;
    assert!(matches!(
        missing,
        Err(TileError::NotFound { zoom: 2, x: 1, y: 0 })
    ));

    let tile = service.get_tile(TileRequest::new(2, 0, 0)).await.unwrap();
    assert_eq!(tile.range, ByteRange::new(300, 50));
    assert_eq!(tile.data.as_ref(), &[7u8; 50][..]);
    assert_eq!(tile.etag.as_deref(), Some("\"v1\""));
}

// =============================================================================
// Leaf Directories
// =============================================================================

#[tokio::test]
async fn test_leaf_directory_fetched_once() {
    let store = shared_store(leaf_archive(5..21, false));
    let service = service_for(&store);

    for id in [5, 8, 20, 5] {
        let tile = service.get_tile(request_for(id)).await.unwrap();
        assert_eq!(tile.data, tile_payload(id));
    }

    // header + root + leaf + four tiles
    assert_eq!(store.get_count(), 7);
    assert_eq!(store.head_count(), 1);
}

#[tokio::test]
async fn test_gzip_leaf_directory() {
    let store = shared_store(leaf_archive(21..85, true));
    let service = service_for(&store);

    let tile = service.get_tile(request_for(40)).await.unwrap();
    assert_eq!(tile.data, tile_payload(40));

    let missing = service.get_tile(request_for(4)).await;
    assert!(matches!(missing, Err(TileError::NotFound { .. })));
}

#[tokio::test]
async fn test_multiple_leaves_partition_ids() {
    let (first_entries, first_tiles) = numbered_tiles(5..21);
    let (mut second_entries, second_tiles) = numbered_tiles(21..30);
    for entry in &mut second_entries {
        entry.offset += first_tiles.len() as u64;
    }

    let first_leaf = encode_directory(&first_entries);
    let second_leaf = encode_directory(&second_entries);
    let root = vec![
        DirectoryEntry::new(5, 0, first_leaf.len() as u32, 0),
        DirectoryEntry::new(
            21,
            first_leaf.len() as u64,
            second_leaf.len() as u32,
            0,
        ),
    ];

    let archive = ArchiveBuilder::new()
        .root(root)
        .leaves([first_leaf, second_leaf].concat())
        .tiles([first_tiles, second_tiles].concat())
        .build();
    let store = shared_store(archive);
    let service = service_for(&store);

    for id in [6, 25, 20, 21] {
        let tile = service.get_tile(request_for(id)).await.unwrap();
        assert_eq!(tile.data, tile_payload(id), "tile id {}", id);
    }

    // header + root + two leaves + four tiles
    assert_eq!(store.get_count(), 8);
}

#[tokio::test]
async fn test_nested_leaf_is_too_deep() {
    let inner = encode_directory(&[DirectoryEntry::new(5, 0, 4, 1)]);
    let outer = encode_directory(&[DirectoryEntry::new(0, 0, inner.len() as u32, 0)]);
    let archive = ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(
            0,
            inner.len() as u64,
            outer.len() as u32,
            0,
        )])
        .leaves([inner, outer].concat())
        .tiles(b"tile".to_vec())
        .build();
    let service = service_for(&shared_store(archive));

    let result = service.get_tile(request_for(5)).await;
    assert!(matches!(
        result,
        Err(TileError::Archive(ArchiveError::DirectoryTooDeep { max_depth: 2 }))
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_load() {
    let store = shared_store(leaf_archive(0..85, false));
    let service = Arc::new(service_for(&store));

    let mut handles = Vec::new();
    for i in 0..100u64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let id = i % 85;
            let tile = service.get_tile(request_for(id)).await.unwrap();
            (id, tile.data)
        }));
    }

    for handle in handles {
        let (id, data) = handle.await.unwrap();
        assert_eq!(data, tile_payload(id));
    }

    assert_eq!(service.cache().load_count(), 1);
    assert_eq!(store.head_count(), 1);

    // Serial reads agree with the concurrent ones
    for id in [0, 42, 84] {
        let tile = service.get_tile(request_for(id)).await.unwrap();
        assert_eq!(tile.data, tile_payload(id));
    }
}

// =============================================================================
// Archive Replacement
// =============================================================================

fn versioned_archive(payload: &[u8]) -> Vec<u8> {
    ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(0, 0, payload.len() as u32, 1)])
        .tiles(payload.to_vec())
        .build()
}

#[tokio::test]
async fn test_replaced_archive_is_reloaded() {
    let store = shared_store(versioned_archive(b"version1"));
    let service = service_for(&store);

    let tile = service.get_tile(TileRequest::new(0, 0, 0)).await.unwrap();
    assert_eq!(tile.data.as_ref(), b"version1");
    assert_eq!(tile.etag.as_deref(), Some("\"v1\""));

    store.replace(versioned_archive(b"version2"), "\"v2\"");

    let tile = service.get_tile(TileRequest::new(0, 0, 0)).await.unwrap();
    assert_eq!(tile.data.as_ref(), b"version2");
    assert_eq!(tile.etag.as_deref(), Some("\"v2\""));

    assert_eq!(store.head_count(), 2);
    assert_eq!(service.cache().load_count(), 2);
    let identity = service.cache().current_identity().await.unwrap();
    assert_eq!(identity.etag.as_deref(), Some("\"v2\""));
}

#[tokio::test]
async fn test_replaced_archive_metadata_is_reloaded() {
    let v1 = ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(0, 0, 4, 1)])
        .metadata(r#"{"name":"first"}"#)
        .tiles(b"tile".to_vec())
        .build();
    let v2 = ArchiveBuilder::new()
        .root(vec![DirectoryEntry::new(0, 0, 4, 1)])
        .metadata(r#"{"name":"again"}"#)
        .tiles(b"tile".to_vec())
        .build();

    let store = shared_store(v1);
    let service = service_for(&store);
    assert_eq!(service.metadata().await.unwrap().metadata["name"], "first");

    store.replace(v2, "\"v2\"");
    assert_eq!(service.metadata().await.unwrap().metadata["name"], "again");
}

/// Store that reports a new ETag on every request.
struct ChurningStore {
    data: Vec<u8>,
    version: AtomicU64,
}

impl ChurningStore {
    fn etag(&self) -> String {
        format!("\"v{}\"", self.version.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ObjectStore for ChurningStore {
    async fn head(&self, _key: &str) -> Result<ObjectInfo, IoError> {
        Ok(ObjectInfo {
            size: self.data.len() as u64,
            etag: Some(self.etag()),
        })
    }

    async fn get(&self, _key: &str, range: Option<ByteRange>) -> Result<ObjectData, IoError> {
        let data = match range {
            Some(r) => self.data[r.offset as usize..r.end() as usize].to_vec(),
            None => self.data.clone(),
        };
        Ok(ObjectData {
            data: data.into(),
            size: self.data.len() as u64,
            etag: Some(self.etag()),
        })
    }

    fn location(&self, key: &str) -> String {
        format!("churn://{}", key)
    }
}

#[tokio::test]
async fn test_archive_that_keeps_changing_returns_503() {
    let store = ChurningStore {
        data: versioned_archive(b"unstable"),
        version: AtomicU64::new(0),
    };
    let router = create_router(
        TileService::new(store, ARCHIVE_KEY),
        RouterConfig::new().with_tracing(false),
    );

    let request = Request::builder()
        .uri("/tiles/0/0/0.pbf")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "archive_changed");
}

#[tokio::test]
async fn test_range_read_across_replacement_returns_503() {
    let store = ChurningStore {
        data: versioned_archive(b"unstable"),
        version: AtomicU64::new(0),
    };
    let router = create_router(
        TileService::new(store, ARCHIVE_KEY),
        RouterConfig::new().with_tracing(false),
    );

    // The HEAD that sizes the range and the GET see different versions
    let request = Request::builder()
        .uri("/")
        .header("range", "bytes=0-9")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get("content-range").is_none());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "archive_changed");
}
