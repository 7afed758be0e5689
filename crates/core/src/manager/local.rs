use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ReadOptions, ResourceManager, SaveOptions, UploadedFile};
use crate::error::{self, Error};
use crate::path::{folder_name, relative_name};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Directory every resource is stored under.
    pub base_path: PathBuf,
    /// Public URL the base directory is served from.
    #[serde(default)]
    pub base_url: String,
}

/// Stores resources as plain files under a base directory.
#[derive(Debug, Clone)]
pub struct FilesystemResourceManager {
    root: PathBuf,
    base_url: String,
}

impl FilesystemResourceManager {
    pub fn new(config: FilesystemConfig) -> Result<Self> {
        let raw = config.base_path.to_string_lossy();
        error::require("base_path", Some(&*raw))?;

        // "/data/uploads/" and "/data/uploads" name the same root, "/" stays "/".
        let trimmed = raw.trim_end_matches(std::path::is_separator);
        let root = if trimmed.is_empty() {
            config.base_path.clone()
        } else {
            PathBuf::from(trimmed)
        };
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { root, base_url })
    }

    pub fn base_path(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves `name` (and `options.folder`) to a path under the base
    /// directory.
    ///
    /// Returns `None` when `options.overwrite` is off and the path is already
    /// taken.
    pub async fn full_path(&self, name: &str, options: &SaveOptions) -> Result<Option<PathBuf>> {
        let relative = folder_name(options.folder.as_deref(), name);
        if !options.overwrite && self.file_exists(&relative).await? {
            debug!(name = %relative, "refusing to overwrite existing resource");
            return Ok(None);
        }
        Ok(Some(self.root.join(relative)))
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(relative_name(name))
    }

    async fn prepare(&self, name: &str, options: &SaveOptions) -> Result<Option<PathBuf>> {
        // The folder alone is not a name: it would be written over as a file.
        if relative_name(name).is_empty() {
            return Err(Error::MissingName.into());
        }
        let Some(path) = self.full_path(name, options).await? else {
            return Ok(None);
        };
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        Ok(Some(path))
    }
}

#[async_trait]
impl ResourceManager for FilesystemResourceManager {
    async fn save(&self, file: &UploadedFile, name: &str, options: &SaveOptions) -> Result<bool> {
        let name = file.name_or_original(name);
        let Some(target) = self.prepare(name, options).await? else {
            return Ok(false);
        };
        let data = tokio::fs::read(&file.temp_path)
            .await
            .with_context(|| format!("failed to read upload: {}", file.temp_path.display()))?;
        write_atomic(&target, &data).await?;
        info!(path = %target.display(), bytes = data.len(), "Saved upload");
        Ok(true)
    }

    async fn save_file(&self, source: &Path, name: &str, options: &SaveOptions) -> Result<bool> {
        let derived;
        let name = if name.is_empty() {
            derived = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            derived.as_str()
        } else {
            name
        };
        let Some(target) = self.prepare(name, options).await? else {
            return Ok(false);
        };
        let data = tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read: {}", source.display()))?;
        write_atomic(&target, &data).await?;
        info!(
            source = %source.display(),
            path = %target.display(),
            bytes = data.len(),
            "Copied file"
        );
        Ok(true)
    }

    async fn save_contents(
        &self,
        body: &[u8],
        name: &str,
        options: &SaveOptions,
    ) -> Result<bool> {
        let Some(target) = self.prepare(name, options).await? else {
            return Ok(false);
        };
        write_atomic(&target, body).await?;
        info!(path = %target.display(), bytes = body.len(), "Saved contents");
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        if !self.file_exists(name).await? {
            return Ok(false);
        }
        let full = self.resolve(name);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                info!(path = %full.display(), "Deleted");
                Ok(true)
            }
            // Removed by someone else between the check and the unlink.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to delete: {}", full.display())),
        }
    }

    async fn file_exists(&self, name: &str) -> Result<bool> {
        let full = self.resolve(name);
        if full == self.root {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn get_url(&self, name: &str, _expires: Option<Duration>) -> Result<String> {
        Ok(format!("{}/{name}", self.base_url))
    }

    async fn get_file_contents(
        &self,
        name: &str,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>> {
        let full = self
            .root
            .join(folder_name(options.folder.as_deref(), name));
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory
                ) =>
            {
                debug!(path = %full.display(), "resource not found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("failed to read: {}", full.display())),
        }
    }
}

async fn create_dir_all(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder
        .create(dir)
        .await
        .with_context(|| format!("failed to create directory: {}", dir.display()))
}

/// Writes through a temporary sibling and renames it over `target`.
async fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("failed to write: {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("failed to write: {}", target.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(root: &Path) -> FilesystemResourceManager {
        FilesystemResourceManager::new(FilesystemConfig {
            base_path: root.to_path_buf(),
            base_url: "https://cdn.example.com/uploads/".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn contents_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        let opts = SaveOptions::default();

        assert!(fs.save_contents(b"world", "test/hello.txt", &opts).await.unwrap());
        assert!(fs.file_exists("test/hello.txt").await.unwrap());

        let data = fs
            .get_file_contents("test/hello.txt", &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(data.as_deref(), Some(&b"world"[..]));

        assert!(fs.delete("test/hello.txt").await.unwrap());
        assert!(!fs.file_exists("test/hello.txt").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_name_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());

        assert!(!fs.file_exists("nope.txt").await.unwrap());
        let data = fs
            .get_file_contents("nope.txt", &ReadOptions::default())
            .await
            .unwrap();
        assert!(data.is_none());
        assert!(!fs.delete("nope.txt").await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_off_keeps_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());

        assert!(fs.save_contents(b"one", "n.txt", &SaveOptions::default()).await.unwrap());
        let saved = fs
            .save_contents(b"two", "n.txt", &SaveOptions::new().overwrite(false))
            .await
            .unwrap();
        assert!(!saved);

        let data = fs.get_file_contents("n.txt", &ReadOptions::default()).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"one"[..]));

        // default still replaces
        assert!(fs.save_contents(b"three", "n.txt", &SaveOptions::default()).await.unwrap());
        let data = fs.get_file_contents("n.txt", &ReadOptions::default()).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"three"[..]));
    }

    #[tokio::test]
    async fn folder_option_nests_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("data/uploads");
        let fs = manager(&base);

        let opts = SaveOptions::new().in_folder("sub");
        assert!(fs.save_contents(b"hello", "a/b.txt", &opts).await.unwrap());
        assert_eq!(
            std::fs::read(base.join("sub/a/b.txt")).unwrap(),
            b"hello".to_vec()
        );

        let data = fs
            .get_file_contents("a/b.txt", &ReadOptions::in_folder("sub"))
            .await
            .unwrap();
        assert_eq!(data.as_deref(), Some(&b"hello"[..]));
        assert!(fs.file_exists("sub/a/b.txt").await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_check_sees_the_folder() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());

        let opts = SaveOptions::new().in_folder("sub");
        assert!(fs.save_contents(b"x", "f.txt", &opts).await.unwrap());
        // the same name outside the folder is free
        assert!(
            fs.save_contents(b"y", "f.txt", &SaveOptions::new().overwrite(false))
                .await
                .unwrap()
        );
        assert!(
            !fs.save_contents(b"z", "f.txt", &opts.clone().overwrite(false))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn names_cannot_escape_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("root");
        let fs = manager(&base);

        let opts = SaveOptions::default();
        assert!(fs.save_contents(b"x", "../../escape.txt", &opts).await.unwrap());
        assert!(!dir.path().join("escape.txt").exists());
        assert!(base.join("escape.txt").exists());

        assert!(fs.save_contents(b"y", "/abs.txt", &opts).await.unwrap());
        assert!(base.join("abs.txt").exists());
    }

    #[tokio::test]
    async fn save_file_derives_name_from_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let fs = manager(&dir.path().join("store"));

        assert!(fs.save_file(&source, "", &SaveOptions::default()).await.unwrap());
        assert!(fs.file_exists("report.pdf").await.unwrap());
        // source is copied, not moved
        assert!(source.exists());

        assert!(
            fs.save_file(&source, "docs/r.pdf", &SaveOptions::default())
                .await
                .unwrap()
        );
        let data = fs.get_file_contents("docs/r.pdf", &ReadOptions::default()).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"%PDF"[..]));
    }

    #[tokio::test]
    async fn save_upload_uses_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("upload-0001");
        std::fs::write(&temp, b"png").unwrap();
        let upload = UploadedFile::new(&temp, "avatar.png");
        let fs = manager(&dir.path().join("store"));

        assert!(fs.save(&upload, "", &SaveOptions::default()).await.unwrap());
        assert!(fs.file_exists("avatar.png").await.unwrap());
        assert!(temp.exists());

        assert!(
            fs.save(&upload, "users/1.png", &SaveOptions::new().overwrite(false))
                .await
                .unwrap()
        );
        assert!(
            !fs.save(&upload, "users/1.png", &SaveOptions::new().overwrite(false))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        let result = fs
            .save_file(&dir.path().join("absent"), "x", &SaveOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        let err = fs
            .save_contents(b"x", "/", &SaveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MissingName));
    }

    #[tokio::test]
    async fn empty_name_in_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        let opts = SaveOptions::new().in_folder("sub");

        for name in ["", "/", "./.."] {
            let err = fs.save_contents(b"x", name, &opts).await.unwrap_err();
            assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MissingName));
        }
        assert!(!dir.path().join("sub").exists());

        // the folder stays usable
        assert!(fs.save_contents(b"y", "inner.txt", &opts).await.unwrap());
        assert!(dir.path().join("sub/inner.txt").is_file());
    }

    #[tokio::test]
    async fn file_used_as_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        fs.save_contents(b"x", "f.txt", &SaveOptions::default()).await.unwrap();

        assert!(!fs.file_exists("f.txt/child").await.unwrap());
        let data = fs
            .get_file_contents("f.txt/child", &ReadOptions::default())
            .await
            .unwrap();
        assert!(data.is_none());
        let data = fs
            .get_file_contents("child", &ReadOptions::in_folder("f.txt"))
            .await
            .unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn url_is_base_url_slash_name() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        for name in ["a.txt", "a/b c.txt", ""] {
            let url = fs.get_url(name, None).await.unwrap();
            assert_eq!(url, format!("https://cdn.example.com/uploads/{name}"));
        }
        let url = fs
            .get_url("a.txt", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/uploads/a.txt");
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let fs = manager(dir.path());
        fs.save_contents(b"1", "f.txt", &SaveOptions::default()).await.unwrap();
        fs.save_contents(b"2", "f.txt", &SaveOptions::default()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["f.txt"]);
    }

    #[test]
    fn base_path_is_required() {
        let err = FilesystemResourceManager::new(FilesystemConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::Config { field: "base_path" })
        );
    }

    #[test]
    fn trailing_separators_are_trimmed() {
        let fs = FilesystemResourceManager::new(FilesystemConfig {
            base_path: PathBuf::from("/data/uploads/"),
            base_url: "/uploads//".to_string(),
        })
        .unwrap();
        assert_eq!(fs.base_path(), Path::new("/data/uploads"));
        assert_eq!(fs.base_url(), "/uploads");
    }
}
