use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::config;

#[derive(Args)]
pub struct RmArgs {
    /// Resource names
    #[arg(required = true)]
    names: Vec<String>,
}

pub async fn run(args: RmArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let manager = store.manager();

    let mut missing = 0;
    for name in &args.names {
        if manager.delete(name).await? {
            println!("{} {name}", style("deleted").green());
        } else {
            missing += 1;
            println!("{} {name}", style("not found").yellow());
        }
    }
    if missing == args.names.len() {
        anyhow::bail!("nothing deleted");
    }
    Ok(())
}
