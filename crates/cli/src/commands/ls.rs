use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::config;
use crate::progress;

#[derive(Args)]
pub struct LsArgs {
    /// Key prefix to list under
    #[arg(default_value = "")]
    prefix: String,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn run(args: LsArgs, config_path: Option<&Path>) -> Result<()> {
    let store = config::open_store(config_path)?;
    let s3 = store.object_storage()?;

    let spinner = progress::create_spinner("Listing objects...");
    let files = s3.list_files(&args.prefix).await?;
    spinner.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }
    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!("{:<50} {:<12} {:<20} {:>10}", "PATH", "CLASS", "MODIFIED", "SIZE");
    println!("{}", "-".repeat(95));
    for file in &files {
        let modified = file
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<50} {:<12} {:<20} {:>10}",
            file.path,
            file.storage_class,
            modified,
            format_bytes(file.size)
        );
    }
    println!("\n{} files", files.len());
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
