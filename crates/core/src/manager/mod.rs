pub mod local;
pub mod s3;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Contract shared by every storage backend.
///
/// Expected domain conditions are values: a missing resource is `None` or
/// `false`, a refused overwrite is `false`. Only backend and transport failures
/// come back as `Err`.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Persists an uploaded file. An empty `name` falls back to the file's
    /// original name.
    async fn save(&self, file: &UploadedFile, name: &str, options: &SaveOptions) -> Result<bool>;

    /// Copies a local file into the store.
    async fn save_file(&self, source: &Path, name: &str, options: &SaveOptions) -> Result<bool>;

    /// Writes raw bytes under `name`.
    async fn save_contents(&self, body: &[u8], name: &str, options: &SaveOptions)
    -> Result<bool>;

    /// Removes a resource. Returns `false` when there was nothing to remove.
    async fn delete(&self, name: &str) -> Result<bool>;

    async fn file_exists(&self, name: &str) -> Result<bool>;

    /// Like [`file_exists`](Self::file_exists), but tells a resource that could
    /// not be read apart from one that is missing, where the backend can.
    async fn check_exists(&self, name: &str) -> Result<Existence> {
        Ok(if self.file_exists(name).await? {
            Existence::Found
        } else {
            Existence::Missing
        })
    }

    /// Direct access URL, optionally valid for `expires` only.
    async fn get_url(&self, name: &str, expires: Option<Duration>) -> Result<String>;

    async fn get_file_contents(&self, name: &str, options: &ReadOptions)
    -> Result<Option<Vec<u8>>>;
}

/// An uploaded file handed over by the request layer. Only read, never moved
/// or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub temp_path: PathBuf,
    pub original_name: String,
}

impl UploadedFile {
    pub fn new(temp_path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            temp_path: temp_path.into(),
            original_name: original_name.into(),
        }
    }

    /// `name`, or the original file name when `name` is empty.
    pub fn name_or_original<'a>(&'a self, name: &'a str) -> &'a str {
        if name.is_empty() {
            &self.original_name
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Existence {
    Found,
    Missing,
    /// The backend refused the read. The resource may exist but is private.
    Forbidden,
}

impl Existence {
    pub fn is_found(self) -> bool {
        self == Existence::Found
    }
}

impl fmt::Display for Existence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Existence::Found => write!(f, "found"),
            Existence::Missing => write!(f, "missing"),
            Existence::Forbidden => write!(f, "forbidden"),
        }
    }
}

/// Canned access policy applied to stored objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    #[default]
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub fn as_str(self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CannedAcl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "private" => Ok(CannedAcl::Private),
            "public-read" => Ok(CannedAcl::PublicRead),
            "public-read-write" => Ok(CannedAcl::PublicReadWrite),
            "authenticated-read" => Ok(CannedAcl::AuthenticatedRead),
            "bucket-owner-read" => Ok(CannedAcl::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(CannedAcl::BucketOwnerFullControl),
            _ => anyhow::bail!("unknown canned ACL: {s}"),
        }
    }
}

/// Options for the save operations.
///
/// Fields a backend has no use for are ignored by it: the local manager reads
/// only `folder` and `overwrite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Subpath prefixed to the name.
    pub folder: Option<String>,
    /// Whether an existing resource may be replaced. Defaults to `true`.
    pub overwrite: bool,
    /// Defaults to `public-read`.
    pub acl: CannedAcl,
    /// Defaults to `application/octet-stream`.
    pub content_type: Option<String>,
    /// Extra put-object parameters, sent as request headers. These win over
    /// the defaults above on conflicting keys.
    pub extra: BTreeMap<String, String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            folder: None,
            overwrite: true,
            acl: CannedAcl::default(),
            content_type: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = acl;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub folder: Option<String>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_options_defaults() {
        let options = SaveOptions::default();
        assert!(options.overwrite);
        assert_eq!(options.acl, CannedAcl::PublicRead);
        assert!(options.folder.is_none());
        assert!(options.extra.is_empty());
    }

    #[test]
    fn save_options_deserialize_with_defaults() {
        let options: SaveOptions = serde_json::from_str(r#"{"folder":"sub"}"#).unwrap();
        assert_eq!(options.folder.as_deref(), Some("sub"));
        assert!(options.overwrite);

        let options: SaveOptions =
            serde_json::from_str(r#"{"overwrite":false,"acl":"private"}"#).unwrap();
        assert!(!options.overwrite);
        assert_eq!(options.acl, CannedAcl::Private);
    }

    #[test]
    fn canned_acl_parses() {
        assert_eq!(
            "Public-Read".parse::<CannedAcl>().unwrap(),
            CannedAcl::PublicRead
        );
        assert!("world-writable".parse::<CannedAcl>().is_err());
    }

    /// Behavior every backend must share.
    async fn check_contract(manager: &dyn ResourceManager) {
        let read = ReadOptions::default();
        let save = SaveOptions::default();

        assert!(!manager.file_exists("fresh.txt").await.unwrap());
        assert!(manager.get_file_contents("fresh.txt", &read).await.unwrap().is_none());

        for (name, body) in [("a.txt", &b"alpha"[..]), ("dir/b.bin", &[0u8, 255, 7][..])] {
            assert!(manager.save_contents(body, name, &save).await.unwrap());
            let data = manager.get_file_contents(name, &read).await.unwrap();
            assert_eq!(data.as_deref(), Some(body));
            assert!(manager.file_exists(name).await.unwrap());
        }

        assert!(manager.delete("a.txt").await.unwrap());
        assert!(!manager.file_exists("a.txt").await.unwrap());
        assert!(!manager.delete("a.txt").await.unwrap());

        let kept = manager
            .save_contents(b"other", "dir/b.bin", &SaveOptions::new().overwrite(false))
            .await
            .unwrap();
        assert!(!kept);
        let data = manager.get_file_contents("dir/b.bin", &read).await.unwrap();
        assert_eq!(data.as_deref(), Some(&[0u8, 255, 7][..]));
    }

    #[tokio::test]
    async fn filesystem_meets_contract() {
        let dir = tempfile::tempdir().unwrap();
        let manager = super::local::FilesystemResourceManager::new(super::local::FilesystemConfig {
            base_path: dir.path().to_path_buf(),
            base_url: "/uploads".to_string(),
        })
        .unwrap();
        check_contract(&manager).await;
    }

    #[tokio::test]
    async fn object_storage_meets_contract() {
        let config = super::s3::S3Config {
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            bucket: "bucket".to_string(),
            ..super::s3::S3Config::default()
        };
        let client = std::sync::Arc::new(crate::client::MemoryObjectClient::new());
        let manager = super::s3::S3ResourceManager::with_client(config, client).unwrap();
        check_contract(&manager).await;
    }

    #[test]
    fn uploaded_file_name_fallback() {
        let file = UploadedFile::new("/tmp/php1234", "avatar.png");
        assert_eq!(file.name_or_original(""), "avatar.png");
        assert_eq!(file.name_or_original("me.png"), "me.png");
    }
}
