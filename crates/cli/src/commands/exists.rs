use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use resman_core::Existence;

use crate::config;

#[derive(Args)]
pub struct ExistsArgs {
    /// Resource name
    name: String,
}

pub async fn run(args: ExistsArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let existence = store.manager().check_exists(&args.name).await?;
    match existence {
        Existence::Found => {
            println!("{} {}", style(existence).green(), args.name);
            Ok(())
        }
        Existence::Missing => anyhow::bail!("{} {}", style(existence).red(), args.name),
        // s3 probes anonymously, so private objects end up here
        Existence::Forbidden => anyhow::bail!(
            "{} {} (the object may exist but is not publicly readable)",
            style(existence).yellow(),
            args.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_core::FilesystemConfig;

    #[tokio::test]
    async fn missing_resource_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("here.txt"), b"x").unwrap();
        let config_path = dir.path().join("resman.toml");
        config::AppConfig {
            backend: config::BackendConfig::Local(FilesystemConfig {
                base_path: store,
                base_url: String::new(),
            }),
        }
        .save(Some(&config_path))
        .unwrap();

        let found = ExistsArgs {
            name: "here.txt".to_string(),
        };
        assert!(run(found, Some(&config_path)).await.is_ok());

        let missing = ExistsArgs {
            name: "gone.txt".to_string(),
        };
        let err = run(missing, Some(&config_path)).await.unwrap_err();
        assert!(err.to_string().contains("gone.txt"));
    }
}
