//! File-backed cache.
//!
//! Each entry is a pair of files inside `root/<cacheName>/`:
//! - `<sha256(key)>`: the content bytes
//! - `<sha256(key)>_metadata.txt`: a JSON object of string metadata, including
//!   `path_to_file` and the optional `expiry_in_millis`
//!
//! A content file without readable metadata counts as corrupt and is deleted
//! on the next read. `legacy` keeps the older URL-derived file naming used by
//! downloads that predate the metadata files.

pub mod file_cache;
pub mod legacy;
pub mod types;

pub use file_cache::FileCacheService;
pub use legacy::{CacheFileManager, LegacyCacheFileInfo};
pub use types::{CacheEntry, CacheExpiry, CacheResult, CacheService};
