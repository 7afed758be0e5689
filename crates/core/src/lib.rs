pub mod client;
pub mod error;
pub mod manager;
pub mod path;

pub use client::{ListingEntry, MemoryObjectClient, ObjectClient, RustS3Client};
pub use error::Error;
pub use manager::local::{FilesystemConfig, FilesystemResourceManager};
pub use manager::s3::{S3Config, S3ResourceManager};
pub use manager::{CannedAcl, Existence, ReadOptions, ResourceManager, SaveOptions, UploadedFile};
