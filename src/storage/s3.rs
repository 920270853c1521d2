//! S3 object store driven by temporary identity-pool credentials.
//!
//! Every request goes through the AWS SDK with the current credential
//! passed as a per-request override.  Upload bodies are streamed in
//! chunks so the caller sees byte progress.  Presigned URLs are computed
//! locally from the cached credential.

use aws_sdk_s3::config::RequestChecksumCalculation;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use http_body::Frame;
use http_body_util::StreamBody;
use reqwest::Url;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;
use tracing::{debug, info};

use super::store::{ObjectStore, ObjectSummary, TransferProgress};
use crate::credentials::{CredentialProvider, StorageCredential};
use crate::errors::{ClientError, ClientResult};
use crate::sigv4::{self, encode_key, sdk_credentials};

/// Object store backed by an S3 bucket.
pub struct S3ObjectStore {
    /// SDK client; credentials are supplied per request.
    client: Client,
    credentials: CredentialProvider,
    region: String,
    /// Custom endpoint (S3-compatible servers, tests).
    endpoint: Option<String>,
    use_path_style: bool,
    chunk_size: usize,
}

impl S3ObjectStore {
    /// Create a store for `region`.
    ///
    /// No ambient AWS credentials are loaded; every request uses the
    /// credential held by `credentials`.
    pub async fn new(
        credentials: CredentialProvider,
        region: String,
        endpoint: Option<String>,
        use_path_style: bool,
        chunk_size: usize,
    ) -> Self {
        let endpoint = endpoint.map(|e| e.trim_end_matches('/').to_string());
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .no_credentials();

        if let Some(ref endpoint) = endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        // Streamed bodies are sent as-is, without aws-chunked checksum trailers.
        let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(use_path_style)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 object store initialized: region={} endpoint={:?} path_style={}",
            region, endpoint, use_path_style
        );

        Self {
            client,
            credentials,
            region,
            endpoint,
            use_path_style,
            chunk_size: chunk_size.max(1),
        }
    }

    /// URL of `key` in `bucket`, with the key URI-encoded.
    fn object_url(&self, bucket: &str, key: &str) -> ClientResult<Url> {
        let encoded = encode_key(key);
        let raw = match (&self.endpoint, self.use_path_style) {
            (Some(endpoint), true) => format!("{endpoint}/{bucket}/{encoded}"),
            (Some(endpoint), false) => {
                let mut url = parse_url(endpoint)?;
                let host = url.host_str().unwrap_or_default().to_string();
                url.set_host(Some(&format!("{bucket}.{host}")))
                    .map_err(invalid_url)?;
                url.set_path(&format!("/{encoded}"));
                return Ok(url);
            }
            (None, true) => format!("https://s3.{}.amazonaws.com/{bucket}/{encoded}", self.region),
            (None, false) => format!("https://{bucket}.s3.{}.amazonaws.com/{encoded}", self.region),
        };
        parse_url(&raw)
    }
}

fn parse_url(raw: &str) -> ClientResult<Url> {
    Url::parse(raw).map_err(invalid_url)
}

fn invalid_url(err: impl std::fmt::Display) -> ClientError {
    ClientError::InvalidArgument {
        message: format!("invalid object URL: {err}"),
    }
}

/// Per-request config carrying `credential`.
fn request_config(credential: &StorageCredential) -> aws_sdk_s3::config::Builder {
    aws_sdk_s3::config::Builder::default().credentials_provider(sdk_credentials(credential))
}

/// Storage error for a failed SDK call, preferring the S3 error code.
fn sdk_error<E, R>(operation: String, err: aws_sdk_s3::error::SdkError<E, R>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error().and_then(|e| e.code()) {
        Some(code) => ClientError::storage(format!("{operation}: {code}")),
        None => ClientError::storage(format!("{operation}: {}", DisplayErrorContext(&err))),
    }
}

/// Split `data` into `chunk_size` slices without copying.
fn chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

/// Request body yielding `data` in chunks, reporting `(sent, total)` as
/// each chunk is handed to the transport.
fn progress_body(data: &Bytes, chunk_size: usize, progress: TransferProgress) -> ByteStream {
    let total = data.len() as u64;
    let mut sent = 0u64;
    let frames = futures_util::stream::iter(chunks(data, chunk_size).into_iter().map(
        move |chunk| {
            sent += chunk.len() as u64;
            progress(sent, total);
            Ok::<_, std::io::Error>(Frame::data(chunk))
        },
    ));
    ByteStream::from_body_1_x(StreamBody::new(frames))
}

impl ObjectStore for S3ObjectStore {
    fn list(
        &self,
        bucket: &str,
        max_keys: i32,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<ObjectSummary>>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            let credential = self.credentials.credential().await?;
            debug!("S3 ListObjectsV2: bucket={} max_keys={}", bucket, max_keys);

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&bucket)
                .max_keys(max_keys)
                .customize()
                .config_override(request_config(&credential))
                .send()
                .await
                .map_err(|e| sdk_error(format!("ListObjectsV2 {bucket}"), e))?;

            Ok(resp
                .contents()
                .iter()
                .map(|object| ObjectSummary {
                    name: object.key().unwrap_or_default().to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
                .collect())
        })
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: TransferProgress,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let credential = self.credentials.credential().await?;
            let total = data.len();
            debug!("S3 PutObject: bucket={} key={} bytes={}", bucket, key, total);

            self.client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_length(total as i64)
                .body(progress_body(&data, self.chunk_size, progress))
                .customize()
                .config_override(request_config(&credential))
                .send()
                .await
                .map_err(|e| sdk_error(format!("PUT {key}"), e))?;
            Ok(())
        })
    }

    fn presign_get(&self, bucket: &str, key: &str, ttl_seconds: u64) -> ClientResult<String> {
        let credential = self.credentials.cached().ok_or(ClientError::NoCredential)?;
        let url = self.object_url(bucket, key)?;
        sigv4::presign_url(
            "GET",
            &url,
            &credential,
            &self.region,
            SystemTime::now(),
            ttl_seconds,
        )
    }
}

// -- Tests -------------------------------------------------------------------
