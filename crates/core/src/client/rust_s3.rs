use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tracing::debug;

use super::{ListPage, ObjectClient, ObjectSummary, PutObject};
use crate::manager::Existence;
use crate::manager::s3::S3Config;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest expiry S3 accepts for a presigned URL.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// [`ObjectClient`] backed by `rust-s3`.
pub struct RustS3Client {
    bucket: Box<Bucket>,
    http: reqwest::Client,
}

impl RustS3Client {
    pub fn connect(config: &S3Config) -> Result<Self> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .with_context(|| format!("invalid region: {}", config.region))?,
        };
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )?;
        let mut bucket = Bucket::new(&config.bucket, region, credentials)?;
        if config.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        debug!(bucket = %config.bucket, region = %config.region, "S3 client ready");
        Ok(Self { bucket, http })
    }
}

#[async_trait]
impl ObjectClient for RustS3Client {
    async fn put_object(&self, request: PutObject<'_>) -> Result<()> {
        let mut bucket = self.bucket.clone();
        for (name, value) in &request.headers {
            bucket.add_header(name, value);
        }
        let response = bucket
            .put_object_with_content_type(request.key, request.body, &request.content_type)
            .await
            .with_context(|| format!("S3 PUT failed: {}", request.key))?;
        ensure_success("PUT", request.key, response.status_code(), response.as_slice())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.bucket.get_object(key).await {
            Ok(response) if response.status_code() == 404 => Ok(None),
            Ok(response) => {
                ensure_success("GET", key, response.status_code(), response.as_slice())?;
                Ok(Some(response.to_vec()))
            }
            Err(e) if http_status(&e) == Some(404) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("S3 GET failed: {key}")),
        }
    }

    async fn head_object(&self, key: &str) -> Result<bool> {
        match self.bucket.head_object(key).await {
            Ok((_, status)) if (200..300).contains(&status) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => anyhow::bail!("S3 HEAD failed: {key} (status {status})"),
            Err(e) if http_status(&e) == Some(404) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("S3 HEAD failed: {key}")),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<bool> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .with_context(|| format!("S3 DELETE failed: {key}"))?;
        ensure_success("DELETE", key, response.status_code(), response.as_slice())?;
        let marker = response
            .headers()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("x-amz-delete-marker"))
            .is_some_and(|(_, value)| value.eq_ignore_ascii_case("true"));
        Ok(marker)
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let (result, status) = self
            .bucket
            .list_page(prefix.to_string(), None, continuation, None, None)
            .await
            .with_context(|| format!("S3 LIST failed: {prefix}"))?;
        if !(200..300).contains(&status) {
            anyhow::bail!("S3 LIST failed: {prefix} (status {status})");
        }
        let objects = result
            .contents
            .into_iter()
            .map(|obj| ObjectSummary {
                last_modified: DateTime::parse_from_rfc3339(&obj.last_modified)
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
                key: obj.key,
                size: obj.size,
                storage_class: obj.storage_class,
            })
            .collect();
        let next_continuation = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };
        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn object_url(&self, key: &str, expires: Option<Duration>) -> Result<String> {
        match expires {
            None => Ok(format!("{}/{}", self.bucket.url(), key.trim_start_matches('/'))),
            Some(expires) => {
                let secs = expires.as_secs().clamp(1, MAX_PRESIGN_SECS) as u32;
                self.bucket
                    .presign_get(key, secs, None)
                    .await
                    .with_context(|| format!("S3 presign failed: {key}"))
            }
        }
    }

    async fn probe_public(&self, url: &str) -> Result<Existence> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = response.status();
        debug!(%url, %status, "public probe");
        if status.is_success() {
            Ok(Existence::Found)
        } else if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            Ok(Existence::Forbidden)
        } else if status.is_client_error() {
            Ok(Existence::Missing)
        } else {
            anyhow::bail!("GET {url} failed with status {status}")
        }
    }
}

fn http_status(err: &S3Error) -> Option<u16> {
    match err {
        S3Error::HttpFailWithBody(status, _) => Some(*status),
        _ => None,
    }
}

fn ensure_success(method: &str, key: &str, status: u16, body: &[u8]) -> Result<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    anyhow::bail!(
        "S3 {method} failed: {key} (status {status}): {}",
        String::from_utf8_lossy(body)
    )
}
