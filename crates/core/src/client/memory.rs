use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::{ListPage, ObjectClient, ObjectSummary, PutObject};
use crate::manager::Existence;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object kept by [`MemoryObjectClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
}

impl StoredObject {
    /// The canned ACL the object was stored with, if any.
    pub fn acl(&self) -> Option<&str> {
        self.headers.get("x-amz-acl").map(String::as_str)
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    deletes: usize,
}

/// In-memory [`ObjectClient`], for tests and local development.
///
/// Public URLs take the form `memory://{key}`. Objects stored with a
/// `public-read` or `public-read-write` ACL are found by
/// [`probe_public`](ObjectClient::probe_public); other objects are reported
/// as forbidden, like a real bucket would.
pub struct MemoryObjectClient {
    state: Mutex<State>,
    page_size: usize,
    versioned: bool,
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            versioned: false,
        }
    }

    /// Caps listing pages at `page_size` keys.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Reports a deletion marker for every delete, like a versioned bucket.
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    /// Stores an object directly, bypassing any manager.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        let object = StoredObject {
            body: body.into(),
            content_type: "application/octet-stream".to_string(),
            headers: BTreeMap::new(),
        };
        self.lock().objects.insert(key.into(), object);
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Number of delete calls issued so far.
    pub fn delete_calls(&self) -> usize {
        self.lock().deletes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn put_object(&self, request: PutObject<'_>) -> Result<()> {
        let object = StoredObject {
            body: request.body.to_vec(),
            content_type: request.content_type.clone(),
            headers: request.headers.clone(),
        };
        self.lock().objects.insert(request.key.to_string(), object);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().objects.get(key).map(|o| o.body.clone()))
    }

    async fn head_object(&self, key: &str) -> Result<bool> {
        Ok(self.lock().objects.contains_key(key))
    }

    async fn delete_object(&self, key: &str) -> Result<bool> {
        let mut state = self.lock();
        state.deletes += 1;
        state.objects.remove(key);
        Ok(self.versioned)
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let state = self.lock();
        let now = Utc::now();
        let mut matching = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.as_deref().is_none_or(|after| key.as_str() > after));

        let objects: Vec<ObjectSummary> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.body.len() as u64,
                storage_class: Some("STANDARD".to_string()),
                last_modified: Some(now),
            })
            .collect();
        let next_continuation = match matching.next() {
            Some(_) => objects.last().map(|o| o.key.clone()),
            None => None,
        };
        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn object_url(&self, key: &str, expires: Option<Duration>) -> Result<String> {
        Ok(match expires {
            None => format!("memory://{key}"),
            Some(expires) => format!("memory://{key}?expires={}", expires.as_secs()),
        })
    }

    async fn probe_public(&self, url: &str) -> Result<Existence> {
        let Some(rest) = url.strip_prefix("memory://") else {
            anyhow::bail!("not a memory URL: {url}");
        };
        let key = rest.split('?').next().unwrap_or(rest);
        let state = self.lock();
        Ok(match state.objects.get(key).map(StoredObject::acl) {
            None => Existence::Missing,
            Some(Some("public-read" | "public-read-write")) => Existence::Found,
            Some(_) => Existence::Forbidden,
        })
    }
}
