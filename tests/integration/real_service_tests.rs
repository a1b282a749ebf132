//! Real service integration tests using MinIO and a running server.
//!
//! # Requirements
//!
//! 1. MinIO listening on `localhost:9000` with a `tiles` bucket:
//!    ```bash
//!    docker run -p 9000:9000 minio/minio server /data
//!    ```
//!
//! 2. The server started against the uploaded fixture:
//!    ```bash
//!    AWS_ACCESS_KEY_ID=minioadmin AWS_SECRET_ACCESS_KEY=minioadmin \
//!    pmtiles-streamer serve --s3-bucket tiles --archive-key integration.pmtiles \
//!        --s3-endpoint http://localhost:9000
//!    ```
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test integration real_service -- --ignored --test-threads=1
//! ```
//!
//! These tests are marked as `#[ignore]` by default because they require external
//! services to be running.

use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use super::test_utils::{patterned_bytes, simple_archive, tile_payload};

/// Default URLs for a local setup
const MINIO_ENDPOINT: &str = "http://localhost:9000";
const SERVER_URL: &str = "http://localhost:3000";
const MINIO_BUCKET: &str = "tiles";

/// MinIO default credentials
const MINIO_ACCESS_KEY: &str = "minioadmin";
const MINIO_SECRET_KEY: &str = "minioadmin";

/// Object key the server is expected to serve
const TEST_ARCHIVE_KEY: &str = "integration.pmtiles";

/// Check if the MinIO service is reachable
async fn is_minio_available() -> bool {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    client
        .get(format!("{}/minio/health/live", MINIO_ENDPOINT))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

/// Check if the tile server is reachable
async fn is_server_available() -> bool {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    client
        .get(format!("{}/health", SERVER_URL))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

/// Create an S3 client configured for MinIO
fn create_minio_client() -> aws_sdk_s3::Client {
    let creds = aws_sdk_s3::config::Credentials::new(
        MINIO_ACCESS_KEY,
        MINIO_SECRET_KEY,
        None,
        None,
        "test",
    );

    let config = aws_sdk_s3::Config::builder()
        .behavior_version_latest()
        .region(aws_sdk_s3::config::Region::new("us-east-1"))
        .endpoint_url(MINIO_ENDPOINT)
        .credentials_provider(creds)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Upload the fixture archive, creating the bucket if needed
async fn upload_fixture(client: &aws_sdk_s3::Client, data: Vec<u8>) -> Result<(), String> {
    // Already-exists errors are fine
    let _ = client.create_bucket().bucket(MINIO_BUCKET).send().await;

    client
        .put_object()
        .bucket(MINIO_BUCKET)
        .key(TEST_ARCHIVE_KEY)
        .body(ByteStream::from(Bytes::from(data)))
        .send()
        .await
        .map_err(|e| format!("Failed to upload to MinIO: {}", e))?;

    Ok(())
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Helper to skip test with a message
macro_rules! skip_if {
    ($cond:expr, $msg:expr) => {
        if $cond {
            eprintln!("SKIPPED: {}", $msg);
            return;
        }
    };
}

// =============================================================================
// Pre-flight Checks
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_services_available() {
    let minio_ok = is_minio_available().await;
    let server_ok = is_server_available().await;

    println!("MinIO available: {}", minio_ok);
    println!("Server available: {}", server_ok);

    assert!(minio_ok, "MinIO is not available at {}", MINIO_ENDPOINT);
    assert!(server_ok, "Tile server is not available at {}", SERVER_URL);
}

// =============================================================================
// Tiles Against Real Storage
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_real_tile_retrieval() {
    skip_if!(!is_minio_available().await, "MinIO is not available");
    skip_if!(!is_server_available().await, "Server is not available");

    upload_fixture(&create_minio_client(), simple_archive())
        .await
        .expect("Failed to upload fixture archive");

    let client = http_client();

    let response = client
        .get(format!("{}/tiles/2/0/0.pbf", SERVER_URL))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/x-protobuf"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), tile_payload(5));

    let response = client
        .get(format!("{}/tiles/2/1/0.pbf", SERVER_URL))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_real_metadata_and_health() {
    skip_if!(!is_minio_available().await, "MinIO is not available");
    skip_if!(!is_server_available().await, "Server is not available");

    let archive = simple_archive();
    let size = archive.len() as u64;
    upload_fixture(&create_minio_client(), archive)
        .await
        .expect("Failed to upload fixture archive");

    let client = http_client();

    let health: serde_json::Value = client
        .get(format!("{}/health", SERVER_URL))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["objectName"], TEST_ARCHIVE_KEY);
    assert_eq!(health["size"], size);

    let metadata: serde_json::Value = client
        .get(format!("{}/metadata", SERVER_URL))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metadata["metadata"]["name"], "durango");
}

// =============================================================================
// Raw Ranges Against Real Storage
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_real_range_requests() {
    skip_if!(!is_minio_available().await, "MinIO is not available");
    skip_if!(!is_server_available().await, "Server is not available");

    // The raw endpoint does not parse the archive, so any bytes will do
    let data = patterned_bytes(1000);
    upload_fixture(&create_minio_client(), data.clone())
        .await
        .expect("Failed to upload fixture");

    let client = http_client();
    let url = format!("{}/{}", SERVER_URL, TEST_ARCHIVE_KEY);

    let response = client
        .get(&url)
        .header("range", "bytes=0-99")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 206);
    assert_eq!(response.headers()["content-range"], "bytes 0-99/1000");
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[0..100]);

    let response = client
        .get(&url)
        .header("range", "bytes=500-")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 206);
    assert_eq!(response.bytes().await.unwrap().len(), 500);

    let response = client
        .get(&url)
        .header("range", "bytes=900-1099")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 416);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().len(), 1000);
}
