use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::info;

use resman_core::{FilesystemConfig, S3Config};

use crate::config::{AppConfig, BackendConfig};

#[derive(Args)]
pub struct InitArgs {
    /// Backend type: local or s3
    #[arg(long)]
    backend: String,

    /// Base directory for the local backend
    #[arg(long)]
    path: Option<PathBuf>,

    /// Public URL the local base directory is served from
    #[arg(long, default_value = "")]
    base_url: String,

    /// S3 bucket name
    #[arg(long)]
    bucket: Option<String>,

    /// S3 region
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Custom endpoint for S3-compatible services
    #[arg(long)]
    endpoint: Option<String>,

    /// S3 access key
    #[arg(long)]
    access_key: Option<String>,

    /// S3 secret key
    #[arg(long)]
    secret_key: Option<String>,

    /// Static website URL of the bucket
    #[arg(long)]
    static_site_url: Option<String>,

    /// Replace an existing config
    #[arg(long)]
    force: bool,
}

pub async fn run(args: InitArgs, config_path: Option<&Path>) -> Result<()> {
    let target = AppConfig::resolve_path(config_path);
    if target.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {} (use --force to replace it)",
            target.display()
        );
    }

    let backend = match args.backend.as_str() {
        "local" => {
            let path = args
                .path
                .ok_or_else(|| anyhow::anyhow!("--path required for local backend"))?;
            BackendConfig::Local(FilesystemConfig {
                base_path: path,
                base_url: args.base_url,
            })
        }
        "s3" => {
            let bucket = args
                .bucket
                .ok_or_else(|| anyhow::anyhow!("--bucket required for S3 backend"))?;
            let access_key = args
                .access_key
                .ok_or_else(|| anyhow::anyhow!("--access-key required for S3 backend"))?;
            let secret_key = args
                .secret_key
                .ok_or_else(|| anyhow::anyhow!("--secret-key required for S3 backend"))?;
            BackendConfig::S3(S3Config {
                access_key,
                secret_key,
                bucket,
                region: args.region,
                endpoint: args.endpoint,
                static_site_base_url: args.static_site_url,
            })
        }
        other => anyhow::bail!("unknown backend: {other} (supported: local, s3)"),
    };

    let config = AppConfig { backend };
    // Fail on a bad config now rather than on first use.
    config.open()?;
    if let BackendConfig::Local(local) = &config.backend {
        tokio::fs::create_dir_all(&local.base_path).await?;
    }
    let saved = config.save(Some(&target))?;

    info!(config_path = %saved.display(), backend = %args.backend, "Config saved");
    println!("Config: {}", saved.display());
    Ok(())
}
