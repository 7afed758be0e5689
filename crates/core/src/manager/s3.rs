use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt, future, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{Existence, ReadOptions, ResourceManager, SaveOptions, UploadedFile};
use crate::client::{ListingEntry, ObjectClient, PutObject, RustS3Client};
use crate::error::{self, Error};
use crate::path::object_key;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const ACL_HEADER: &str = "x-amz-acl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services. Implies path-style URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Static website URL of the bucket, used for non-expiring links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_site_base_url: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            static_site_base_url: None,
        }
    }
}

impl S3Config {
    pub fn validate(&self) -> Result<(), Error> {
        error::require("access_key", Some(self.access_key.as_str()))?;
        error::require("secret_key", Some(self.secret_key.as_str()))?;
        error::require("bucket", Some(self.bucket.as_str()))?;
        Ok(())
    }
}

/// Stores resources as objects in an S3 bucket.
///
/// The client is built from the config on first use and kept for the life of
/// the manager. Tests and embedders can hand in their own through
/// [`with_client`](Self::with_client).
pub struct S3ResourceManager {
    config: S3Config,
    static_site_base_url: Option<String>,
    client: OnceCell<Arc<dyn ObjectClient>>,
}

impl S3ResourceManager {
    pub fn new(config: S3Config) -> Result<Self> {
        config.validate()?;
        let static_site_base_url = config
            .static_site_base_url
            .as_deref()
            .map(|url| url.trim_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Ok(Self {
            config,
            static_site_base_url,
            client: OnceCell::new(),
        })
    }

    pub fn with_client(config: S3Config, client: Arc<dyn ObjectClient>) -> Result<Self> {
        let manager = Self::new(config)?;
        let _ = manager.client.set(client);
        Ok(manager)
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn static_site_base_url(&self) -> Option<&str> {
        self.static_site_base_url.as_deref()
    }

    async fn client(&self) -> Result<&Arc<dyn ObjectClient>> {
        self.client
            .get_or_try_init(|| async {
                let client = RustS3Client::connect(&self.config)?;
                Ok::<_, anyhow::Error>(Arc::new(client) as Arc<dyn ObjectClient>)
            })
            .await
    }

    /// Deletes every object whose key starts with `prefix` and returns how
    /// many were removed. An empty prefix is refused before the bucket is
    /// touched.
    pub async fn delete_matching_objects(&self, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(Error::EmptyPrefix.into());
        }
        let client = self.client().await?;

        // Collect first so deletes don't shift the pages being walked.
        let mut keys = Vec::new();
        let mut continuation = None;
        loop {
            let page = client.list_page(prefix, continuation).await?;
            keys.extend(page.objects.into_iter().map(|o| o.key));
            match page.next_continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        for key in &keys {
            client.delete_object(key).await?;
        }
        info!(bucket = %self.config.bucket, %prefix, deleted = keys.len(), "Deleted matching objects");
        Ok(keys.len())
    }

    /// Every file under `directory`, directory placeholders excluded.
    pub async fn list_files(&self, directory: &str) -> Result<Vec<ListingEntry>> {
        self.list_stream(directory).try_collect().await
    }

    /// Streams the files under `prefix`, fetching one listing page at a time.
    pub fn list_stream<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Stream<Item = Result<ListingEntry>> + Send + 'a {
        // `Some(token)` is the next page to fetch, `None` means done.
        let pages = stream::try_unfold(Some(None::<String>), move |next| async move {
            let Some(continuation) = next else {
                return Ok::<_, anyhow::Error>(None);
            };
            let client = self.client().await?;
            let page = client.list_page(prefix, continuation).await?;
            debug!(%prefix, objects = page.objects.len(), "listed page");
            Ok(Some((page.objects, page.next_continuation.map(Some))))
        });
        pages
            .map_ok(|objects| stream::iter(objects.into_iter().map(Ok::<_, anyhow::Error>)))
            .try_flatten()
            .try_filter(|object| future::ready(!object.key.ends_with('/')))
            .map_ok(ListingEntry::from)
    }

    /// Deletes `name` and returns the backend's deletion-marker flag as is.
    ///
    /// On versioned buckets the flag can be `true` for a key that never
    /// existed; [`delete`](ResourceManager::delete) does not have that problem.
    pub async fn delete_marker(&self, name: &str) -> Result<bool> {
        let marker = self.client().await?.delete_object(name).await?;
        info!(bucket = %self.config.bucket, key = %name, marker, "Deleted object");
        Ok(marker)
    }

    async fn put(&self, key: &str, body: &[u8], options: &SaveOptions) -> Result<bool> {
        let request = put_request(key, body, options)?;
        let client = self.client().await?;
        if !options.overwrite && client.head_object(key).await? {
            debug!(%key, "refusing to overwrite existing object");
            return Ok(false);
        }
        client.put_object(request).await?;
        info!(
            bucket = %self.config.bucket,
            %key,
            bytes = body.len(),
            acl = options.acl.as_str(),
            "Stored object"
        );
        Ok(true)
    }
}

#[async_trait]
impl ResourceManager for S3ResourceManager {
    async fn save(&self, file: &UploadedFile, name: &str, options: &SaveOptions) -> Result<bool> {
        self.save_file(&file.temp_path, file.name_or_original(name), options)
            .await
    }

    async fn save_file(&self, source: &Path, name: &str, options: &SaveOptions) -> Result<bool> {
        let key = save_key(name, options)?;
        let data = tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read: {}", source.display()))?;
        self.put(&key, &data, options).await
    }

    async fn save_contents(
        &self,
        body: &[u8],
        name: &str,
        options: &SaveOptions,
    ) -> Result<bool> {
        self.put(&save_key(name, options)?, body, options).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let client = self.client().await?;
        if !client.head_object(name).await? {
            return Ok(false);
        }
        client.delete_object(name).await?;
        info!(bucket = %self.config.bucket, key = %name, "Deleted object");
        Ok(true)
    }

    /// Probes the public URL, so private objects read as missing. Use
    /// [`check_exists`](ResourceManager::check_exists) to tell them apart.
    async fn file_exists(&self, name: &str) -> Result<bool> {
        Ok(self.check_exists(name).await?.is_found())
    }

    async fn check_exists(&self, name: &str) -> Result<Existence> {
        let url = self.get_url(name, None).await?;
        let existence = self.client().await?.probe_public(&url).await?;
        if existence == Existence::Forbidden {
            warn!(key = %name, %url, "public read refused; object may exist but is private");
        }
        Ok(existence)
    }

    async fn get_url(&self, name: &str, expires: Option<Duration>) -> Result<String> {
        if let (Some(base), None) = (&self.static_site_base_url, expires) {
            return Ok(format!("{base}/{name}"));
        }
        self.client().await?.object_url(name, expires).await
    }

    async fn get_file_contents(
        &self,
        name: &str,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>> {
        let key = object_key(options.folder.as_deref(), name);
        let data = self.client().await?.get_object(&key).await?;
        if data.is_none() {
            debug!(%key, "object not found");
        }
        Ok(data)
    }
}

/// Key a save writes to. A folder without a name would produce a `folder/`
/// placeholder that listings hide, so the name is required either way.
fn save_key(name: &str, options: &SaveOptions) -> Result<String, Error> {
    if name.trim_matches('/').is_empty() {
        return Err(Error::MissingName);
    }
    Ok(object_key(options.folder.as_deref(), name))
}

/// Default put parameters with the caller's extras merged over them.
fn put_request<'a>(key: &'a str, body: &'a [u8], options: &SaveOptions) -> Result<PutObject<'a>> {
    let mut content_type = options
        .content_type
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let mut headers = BTreeMap::new();
    headers.insert(ACL_HEADER.to_string(), options.acl.as_str().to_string());

    for (name, value) in &options.extra {
        let header = name.trim().to_ascii_lowercase();
        if !is_header_name(&header) || !is_header_value(value) {
            return Err(Error::InvalidParameter { key: name.clone() }.into());
        }
        if header == "content-type" {
            content_type = value.clone();
        } else {
            headers.insert(header, value.clone());
        }
    }

    Ok(PutObject {
        key,
        body,
        content_type,
        headers,
    })
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn is_header_value(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b))
}
