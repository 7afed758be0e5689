pub mod exists;
pub mod get;
pub mod init;
pub mod ls;
pub mod purge;
pub mod put;
pub mod rm;
pub mod url;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Write a config for a local or s3 backend
    Init(init::InitArgs),
    /// Store local files (or stdin)
    Put(put::PutArgs),
    /// Store a file handed over by an upload handler
    Upload(put::UploadArgs),
    /// Print or save a resource's contents
    Get(get::GetArgs),
    /// Delete resources
    Rm(rm::RmArgs),
    /// Check whether a resource exists
    Exists(exists::ExistsArgs),
    /// Print a resource's URL
    Url(url::UrlArgs),
    /// List files under a prefix (s3 only)
    Ls(ls::LsArgs),
    /// Delete every object under a prefix (s3 only)
    Purge(purge::PurgeArgs),
}
