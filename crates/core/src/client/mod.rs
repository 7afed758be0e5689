//! The object-store seam used by [`S3ResourceManager`](crate::manager::s3::S3ResourceManager).

pub mod memory;
pub mod rust_s3;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manager::Existence;

pub use memory::MemoryObjectClient;
pub use rust_s3::RustS3Client;

#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(&self, request: PutObject<'_>) -> Result<()>;

    /// `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Authenticated existence check.
    async fn head_object(&self, key: &str) -> Result<bool>;

    /// Deletes a key and returns the backend's deletion-marker flag.
    async fn delete_object(&self, key: &str) -> Result<bool>;

    /// One page of keys under `prefix`, continuing after `continuation`.
    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage>;

    /// URL of a key, presigned for `expires` when given.
    async fn object_url(&self, key: &str, expires: Option<Duration>) -> Result<String>;

    /// Unauthenticated GET of a public URL.
    async fn probe_public(&self, url: &str) -> Result<Existence>;
}

/// A put-object call: the key, the body, and the request headers.
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: String,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}

impl PutObject<'_> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub next_continuation: Option<String>,
}

/// An object as reported by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub storage_class: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A file found by [`list_files`](crate::manager::s3::S3ResourceManager::list_files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Full key.
    pub path: String,
    /// Last segment of the key.
    pub name: String,
    pub storage_class: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<ObjectSummary> for ListingEntry {
    fn from(object: ObjectSummary) -> Self {
        let name = crate::path::key_basename(&object.key).to_string();
        Self {
            name,
            storage_class: object.storage_class.unwrap_or_default(),
            size: object.size,
            last_modified: object.last_modified,
            path: object.key,
        }
    }
}
