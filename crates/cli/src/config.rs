use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use resman_core::{
    FilesystemConfig, FilesystemResourceManager, ResourceManager, S3Config, S3ResourceManager,
};

const CONFIG_FILE: &str = "resman.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "local")]
    Local(FilesystemConfig),
    #[serde(rename = "s3")]
    S3(S3Config),
}

/// A configured manager, keeping the concrete type around for the operations
/// only one backend offers.
pub enum Store {
    Local(FilesystemResourceManager),
    S3(S3ResourceManager),
}

impl Store {
    pub fn manager(&self) -> &dyn ResourceManager {
        match self {
            Store::Local(manager) => manager,
            Store::S3(manager) => manager,
        }
    }

    pub fn object_storage(&self) -> Result<&S3ResourceManager> {
        match self {
            Store::S3(manager) => Ok(manager),
            Store::Local(_) => anyhow::bail!("this command needs the s3 backend"),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("resman")
            .join(CONFIG_FILE)
    }

    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("config not found at {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config")
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve_path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(path)
    }

    pub fn open(&self) -> Result<Store> {
        match &self.backend {
            BackendConfig::Local(config) => Ok(Store::Local(FilesystemResourceManager::new(
                config.clone(),
            )?)),
            BackendConfig::S3(config) => Ok(Store::S3(S3ResourceManager::new(config.clone())?)),
        }
    }
}

/// Loads the config and opens its backend.
pub fn open_store(path: Option<&Path>) -> Result<Store> {
    AppConfig::load(path)?.open()
}
