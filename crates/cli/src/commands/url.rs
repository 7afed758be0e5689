use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::config;

#[derive(Args)]
pub struct UrlArgs {
    /// Resource name
    name: String,

    /// Presign the URL for this many seconds (s3 only)
    #[arg(long)]
    expires: Option<u64>,
}

pub async fn run(args: UrlArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let url = store
        .manager()
        .get_url(&args.name, args.expires.map(Duration::from_secs))
        .await?;
    println!("{url}");
    Ok(())
}
