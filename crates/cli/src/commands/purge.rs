use std::path::Path;

use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;

use crate::config;
use crate::progress;

#[derive(Args)]
pub struct PurgeArgs {
    /// Key prefix; every object under it is deleted
    prefix: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

pub async fn run(args: PurgeArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let s3 = store.object_storage()?;

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete every object under '{}' in bucket '{}'?",
                args.prefix,
                s3.bucket()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let spinner = progress::create_spinner("Deleting objects...");
    let deleted = s3.delete_matching_objects(&args.prefix).await;
    spinner.finish_and_clear();

    println!("Deleted {} objects.", deleted?);
    Ok(())
}
