use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt};

use super::store::{ByteRange, ObjectData, ObjectInfo, ObjectStore, ObjectStream};
use crate::error::IoError;

/// S3-backed implementation of [`ObjectStore`].
///
/// Works against AWS S3 and S3-compatible services (MinIO, Cloudflare R2, ...)
/// using HTTP range requests.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new store for the given bucket.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Issue a GET and read the object size and ETag off the response.
    async fn send_get(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<(GetObjectOutput, u64, Option<String>), IoError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);

        // Range header is inclusive on both ends
        if let Some(range) = range {
            request = request.range(format!("bytes={}-{}", range.offset, range.last()));
        }

        let resp = request.send().await.map_err(|e| {
            let is_not_found = e
                .as_service_error()
                .map(|se| se.is_no_such_key())
                .unwrap_or(false);
            map_sdk_error(e, is_not_found, self.location(key))
        })?;

        let content_length = resp.content_length().unwrap_or(0) as u64;
        let size = resp
            .content_range()
            .and_then(total_from_content_range)
            .unwrap_or(content_length);
        let etag = resp.e_tag().map(str::to_string);

        Ok((resp, size, etag))
    }
}

/// Map an SDK failure to an [`IoError`], recognising "not found" by service
/// error or raw 404 status.
fn map_sdk_error<E>(
    err: SdkError<E, aws_sdk_s3::config::http::HttpResponse>,
    service_not_found: bool,
    location: String,
) -> IoError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status_is_404 = err
        .raw_response()
        .map(|r| r.status().as_u16() == 404)
        .unwrap_or(false);

    if service_not_found || status_is_404 {
        return IoError::NotFound(location);
    }

    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            IoError::Connection(DisplayErrorContext(&err).to_string())
        }
        _ => IoError::S3(DisplayErrorContext(&err).to_string()),
    }
}

/// Extract the total size from a `Content-Range: bytes a-b/total` value.
fn total_from_content_range(content_range: &str) -> Option<u64> {
    content_range.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectInfo, IoError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                map_sdk_error(e, is_not_found, self.location(key))
            })?;

        Ok(ObjectInfo {
            size: head.content_length().unwrap_or(0) as u64,
            etag: head.e_tag().map(str::to_string),
        })
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectData, IoError> {
        let (resp, size, etag) = self.send_get(key, range).await?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

        Ok(ObjectData { data, size, etag })
    }

    async fn get_stream(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<ObjectStream, IoError> {
        let (resp, size, etag) = self.send_get(key, range).await?;
        let length = resp.content_length().unwrap_or(0) as u64;

        let body = stream::unfold(resp.body, |mut body| async move {
            let chunk = body.next().await?;
            Some((chunk.map_err(|e| IoError::Connection(e.to_string())), body))
        })
        .boxed();

        Ok(ObjectStream {
            body,
            length,
            size,
            etag,
        })
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO or R2:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
