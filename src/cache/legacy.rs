//! Legacy URL-derived cache file naming.
//!
//! Downloads that predate the metadata files encode their HTTP validators in
//! the file name itself:
//!
//! ```text
//! <sha256(url)>.<hex(etag)>.<lastModifiedEpochMs>[_partial]
//! <sha256(url)>.<lastModifiedEpochMs>[_partial]
//! ```
//!
//! A file keeps the `_partial` suffix until [`CacheFileManager::mark_complete`]
//! renames it away.

use crate::hashing::{hex_decode, hex_encode, sha256_hex};
use crate::services::DeviceInforming;
use crate::types::is_blank;
use log::{debug, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const PARTIAL_FILE_SUFFIX: &str = "_partial";

/// Validators recovered from a legacy cache file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyCacheFileInfo {
    pub url_hash: String,
    pub etag: Option<String>,
    pub last_modified_ms: i64,
    pub partial: bool,
}

/// Manages legacy cache files in a single directory.
#[derive(Clone, Debug)]
pub struct CacheFileManager {
    directory: PathBuf,
}

impl CacheFileManager {
    /// Manager for `<appCacheDir>/<sub_dir>`.
    pub fn new(device: &dyn DeviceInforming, sub_dir: &str) -> Option<Self> {
        let cache_dir = device.application_cache_dir()?;
        Some(Self::with_directory(cache_dir.join(sub_dir)))
    }

    pub fn with_directory(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates an empty partial file for a download of `url`.
    pub fn create_cache_file(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified_ms: i64,
    ) -> Option<PathBuf> {
        if is_blank(url) {
            return None;
        }

        if let Err(e) = fs::create_dir_all(&self.directory) {
            warn!(
                "Failed to create legacy cache directory {}: {}",
                self.directory.display(),
                e
            );
            return None;
        }

        let base = sha256_hex(url);
        let name = match etag.filter(|e| !e.is_empty()) {
            Some(etag) => format!(
                "{}.{}.{}{}",
                base,
                hex_encode(etag.as_bytes()),
                last_modified_ms,
                PARTIAL_FILE_SUFFIX
            ),
            None => format!("{}.{}{}", base, last_modified_ms, PARTIAL_FILE_SUFFIX),
        };

        let path = self.directory.join(name);
        match File::create(&path) {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("Failed to create {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Renames a partial file to its completed name.
    ///
    /// Returns the completed path, or `None` when the file is not partial or
    /// the rename fails.
    pub fn mark_complete(&self, path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?.to_str()?;
        let completed_name = name.strip_suffix(PARTIAL_FILE_SUFFIX)?;
        let completed = path.with_file_name(completed_name);

        match fs::rename(path, &completed) {
            Ok(()) => Some(completed),
            Err(e) => {
                warn!("Failed to mark {} complete: {}", path.display(), e);
                None
            }
        }
    }

    /// Most recent cached file for `url`, by last-modified time.
    pub fn cached_file_for_url(&self, url: &str, ignore_partial: bool) -> Option<PathBuf> {
        self.files_for_url(url)
            .into_iter()
            .filter_map(|path| Self::parse_file_name(&path).map(|info| (path, info)))
            .filter(|(_, info)| !(ignore_partial && info.partial))
            .max_by_key(|(_, info)| info.last_modified_ms)
            .map(|(path, _)| path)
    }

    /// Deletes every cached file for `url`. True when all deletions succeeded.
    pub fn delete_cached_data_for_url(&self, url: &str) -> bool {
        let mut all_deleted = true;
        for path in self.files_for_url(url) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to delete {}: {}", path.display(), e);
                all_deleted = false;
            }
        }
        all_deleted
    }

    fn files_for_url(&self, url: &str) -> Vec<PathBuf> {
        if is_blank(url) {
            return Vec::new();
        }

        let prefix = format!("{}.", sha256_hex(url));
        match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|name| name.starts_with(&prefix))
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                debug!(
                    "Legacy cache directory {} unreadable: {}",
                    self.directory.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    pub fn is_partial(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.ends_with(PARTIAL_FILE_SUFFIX))
            .unwrap_or(false)
    }

    /// Recovers the URL hash, ETag and last-modified time from a file name.
    pub fn parse_file_name(path: &Path) -> Option<LegacyCacheFileInfo> {
        let name = path.file_name()?.to_str()?;
        let partial = name.ends_with(PARTIAL_FILE_SUFFIX);
        let name = name.strip_suffix(PARTIAL_FILE_SUFFIX).unwrap_or(name);

        let parts: Vec<&str> = name.split('.').collect();
        let (url_hash, etag, last_modified) = match parts.as_slice() {
            [hash, last_modified] => (*hash, None, *last_modified),
            [hash, hex_etag, last_modified] => {
                let etag = hex_decode(hex_etag).and_then(|bytes| String::from_utf8(bytes).ok())?;
                (*hash, Some(etag), *last_modified)
            }
            _ => return None,
        };

        Some(LegacyCacheFileInfo {
            url_hash: url_hash.to_string(),
            etag,
            last_modified_ms: last_modified.parse().ok()?,
            partial,
        })
    }
}
