mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "resman",
    version,
    about = "Store and fetch resources on local disk or S3-compatible storage"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        commands::Command::Init(args) => commands::init::run(args, config).await,
        commands::Command::Put(args) => commands::put::run(args, config).await,
        commands::Command::Upload(args) => commands::put::upload(args, config).await,
        commands::Command::Get(args) => commands::get::run(args, config).await,
        commands::Command::Rm(args) => commands::rm::run(args, config).await,
        commands::Command::Exists(args) => commands::exists::run(args, config).await,
        commands::Command::Url(args) => commands::url::run(args, config).await,
        commands::Command::Ls(args) => commands::ls::run(args, config).await,
        commands::Command::Purge(args) => commands::purge::run(args, config).await,
    }
}
