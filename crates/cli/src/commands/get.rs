use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::AsyncWriteExt;

use resman_core::ReadOptions;

use crate::config;

#[derive(Args)]
pub struct GetArgs {
    /// Resource name
    name: String,

    /// Subfolder the resource was stored under
    #[arg(long)]
    folder: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: GetArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let options = ReadOptions {
        folder: args.folder,
    };
    let Some(data) = store
        .manager()
        .get_file_contents(&args.name, &options)
        .await?
    else {
        anyhow::bail!("resource not found: {}", args.name);
    };

    match args.output {
        Some(path) => tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write: {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
