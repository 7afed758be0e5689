use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::io::AsyncReadExt;
use tracing::info;

use resman_core::{CannedAcl, SaveOptions, UploadedFile};

use crate::config;
use crate::progress;

/// Save options shared by `put` and `upload`.
#[derive(Args)]
pub struct SaveArgs {
    /// Subfolder to store under
    #[arg(long)]
    folder: Option<String>,

    /// Keep an existing resource instead of replacing it
    #[arg(long)]
    no_overwrite: bool,

    /// Canned ACL for s3 (e.g. private, public-read)
    #[arg(long)]
    acl: Option<CannedAcl>,

    /// Content type for s3
    #[arg(long)]
    content_type: Option<String>,

    /// Extra put parameter as KEY=VALUE, repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl SaveArgs {
    fn options(&self) -> SaveOptions {
        let mut options = SaveOptions::new().overwrite(!self.no_overwrite);
        options.folder = self.folder.clone();
        options.content_type = self.content_type.clone();
        if let Some(acl) = self.acl {
            options.acl = acl;
        }
        options.extra.extend(self.params.iter().cloned());
        options
    }
}

#[derive(Args)]
pub struct PutArgs {
    /// Files to store
    files: Vec<PathBuf>,

    /// Resource name (single file or --stdin; defaults to the file name)
    #[arg(long)]
    name: Option<String>,

    /// Read the contents from stdin
    #[arg(long, requires = "name", conflicts_with = "files")]
    stdin: bool,

    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args)]
pub struct UploadArgs {
    /// Temporary file written by the upload handler
    temp_path: PathBuf,

    /// Name the client uploaded the file as
    #[arg(long)]
    original_name: String,

    /// Resource name (defaults to the original name)
    #[arg(long, default_value = "")]
    name: String,

    #[command(flatten)]
    save: SaveArgs,
}

pub async fn run(args: PutArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let manager = store.manager();
    let options = args.save.options();

    if args.stdin {
        let name = args.name.unwrap_or_default();
        let mut body = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut body)
            .await
            .context("failed to read stdin")?;
        let saved = manager.save_contents(&body, &name, &options).await?;
        return report(&name, saved);
    }

    if args.files.is_empty() {
        anyhow::bail!("nothing to store: pass files or --stdin");
    }
    if args.name.is_some() && args.files.len() > 1 {
        anyhow::bail!("--name only works with a single file");
    }

    if args.files.len() == 1 {
        let name = display_name(&args.files[0], args.name.as_deref().unwrap_or_default());
        let saved = manager.save_file(&args.files[0], &name, &options).await?;
        return report(&name, saved);
    }

    let pb = progress::create_file_progress(args.files.len() as u64);
    let mut stored = 0u64;
    let mut skipped = Vec::new();
    for file in &args.files {
        let file_name = display_name(file, "");
        pb.set_message(file_name.clone());
        if manager.save_file(file, &file_name, &options).await? {
            stored += 1;
        } else {
            skipped.push(file_name);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(stored, skipped = skipped.len(), "Put finished");
    println!("Stored {stored} files");
    for name in &skipped {
        println!("  {} {name} (already exists)", style("skipped").yellow());
    }
    Ok(())
}

pub async fn upload(args: UploadArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let file = UploadedFile::new(args.temp_path, args.original_name);
    let saved = store
        .manager()
        .save(&file, &args.name, &args.save.options())
        .await?;
    report(file.name_or_original(&args.name), saved)
}

fn display_name(file: &Path, name: &str) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn report(name: &str, saved: bool) -> Result<()> {
    if !saved {
        anyhow::bail!("{name} already exists (overwrite disabled)");
    }
    println!("{} {name}", style("stored").green());
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("Cache-Control=max-age=60").unwrap(),
            ("Cache-Control".to_string(), "max-age=60".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn save_args_build_options() {
        let args = SaveArgs {
            folder: Some("sub".to_string()),
            no_overwrite: true,
            acl: Some(CannedAcl::Private),
            content_type: None,
            params: vec![("x-amz-meta-a".to_string(), "1".to_string())],
        };
        let options = args.options();
        assert_eq!(options.folder.as_deref(), Some("sub"));
        assert!(!options.overwrite);
        assert_eq!(options.acl, CannedAcl::Private);
        assert_eq!(options.extra.get("x-amz-meta-a").map(String::as_str), Some("1"));
    }
}
