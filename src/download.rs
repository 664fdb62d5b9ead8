//! Anonymous HEAD and ranged GET requests against an S3-compatible endpoint.

use std::time::Duration;

use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, CONTENT_LENGTH, ETAG, RANGE},
    Client, StatusCode,
};
use tracing::debug;

use crate::error::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Size and entity tag reported by a HEAD request.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub length: u64,
    pub etag: Option<String>,
}

/// Read access to a bucket of immutable-ish blobs.
pub trait ObjectStore {
    /// Returns `None` when the key does not exist.
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, FetchError>;

    /// Fetches bytes `start..=end`. The server clamps `end` to the object.
    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, FetchError>;

    /// Fetches the whole object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError>;
}

/// Path-style S3 client over plain HTTPS.
///
/// Requests carry no credentials and are never signed, which is what public
/// buckets such as `noaa-ghcn-pds` expect from anonymous readers.
pub struct HttpStore {
    client: Client,
    endpoint: String,
}

impl HttpStore {
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(HttpStore {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key.trim_start_matches('/'))
    }
}

impl ObjectStore for HttpStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, FetchError> {
        let response = self.client.head(self.url(bucket, key)).send().await?;

        match check_status(response.status()) {
            Err(FetchError::NotFound) => return Ok(None),
            result => result?,
        }

        let headers = response.headers();
        let length = content_length(headers)?;
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!("HEAD {}/{}: length {} etag {:?}", bucket, key, length, etag);

        Ok(Some(ObjectMeta { length, etag }))
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(self.url(bucket, key))
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await?;

        check_range_status(response.status(), start)?;
        read_body(response).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(self.url(bucket, key)).send().await?;

        check_status(response.status())?;
        read_body(response).await
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(FetchError::InvalidRange),
        s if !s.is_success() => Err(FetchError::Status(s.as_u16())),
        _ => Ok(()),
    }
}

/// A range that does not start at 0 must come back as `206`; a `200` means
/// the server ignored `Range` and sent the whole object.
fn check_range_status(status: StatusCode, start: u64) -> Result<(), FetchError> {
    check_status(status)?;
    if start > 0 && status != StatusCode::PARTIAL_CONTENT {
        return Err(FetchError::RangeIgnored(status.as_u16()));
    }
    Ok(())
}

// HEAD responses have no body, so the header is the only size there is.
fn content_length(headers: &HeaderMap) -> Result<u64, FetchError> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or(FetchError::MissingLength)
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }

    Ok(body)
}

// -- Tests -------------------------------------------------------------------
