//! File cache service - content and JSON metadata file pairs.
//!
//! # Layout
//! ```text
//! <appCacheDir>/<rootCacheDirName>/<cacheName>/<sha256(key)>
//! <appCacheDir>/<rootCacheDirName>/<cacheName>/<sha256(key)>_metadata.txt
//! ```
//!
//! Bucket directories are created lazily on first write and are never
//! garbage-collected. There is no per-key locking: a `get` racing a `set`
//! on the same key can observe a partially written content file, and
//! concurrent writers resolve as last-writer-wins.

use super::types::{CacheEntry, CacheExpiry, CacheResult, CacheService};
use crate::config::CoreConfig;
use crate::hashing::sha256_hex;
use crate::services::DeviceInforming;
use crate::types::is_blank;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Metadata key holding the content file path.
pub const METADATA_KEY_PATH_TO_FILE: &str = "path_to_file";
/// Metadata key holding the expiry in epoch millis.
pub const METADATA_KEY_EXPIRY_IN_MILLIS: &str = "expiry_in_millis";

const METADATA_FILE_SUFFIX: &str = "_metadata.txt";

/// Cache service storing entries as file pairs under the application cache dir.
pub struct FileCacheService {
    device: Arc<dyn DeviceInforming>,
    root_dir_name: String,
}

impl std::fmt::Debug for FileCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCacheService")
            .field("root_dir_name", &self.root_dir_name)
            .field("root", &self.cache_root())
            .finish()
    }
}

impl FileCacheService {
    pub fn new(device: Arc<dyn DeviceInforming>, config: &CoreConfig) -> Self {
        Self {
            device,
            root_dir_name: config.cache_root_dir_name.clone(),
        }
    }

    /// `<appCacheDir>/<rootCacheDirName>`
    pub fn cache_root(&self) -> Option<PathBuf> {
        self.device
            .application_cache_dir()
            .map(|dir| dir.join(&self.root_dir_name))
    }

    /// Content file location for `(cache_name, key)`.
    ///
    /// A pure function of its inputs and the configured root; the file need not exist.
    pub fn get_cache_location(&self, cache_name: &str, key: &str) -> Option<PathBuf> {
        if is_blank(cache_name) || is_blank(key) || !is_bucket_name(cache_name) {
            return None;
        }
        self.cache_root()
            .map(|root| root.join(cache_name).join(sha256_hex(key)))
    }

    /// Metadata file location paired with a content file.
    pub fn metadata_location(content_path: &Path) -> PathBuf {
        let mut name = content_path.as_os_str().to_os_string();
        name.push(METADATA_FILE_SUFFIX);
        PathBuf::from(name)
    }

    fn create_bucket(&self, cache_name: &str) -> Result<PathBuf, String> {
        if !is_bucket_name(cache_name) {
            return Err(format!("Rejecting cache name '{}'", cache_name));
        }

        let app_cache_dir = self
            .device
            .application_cache_dir()
            .ok_or("Application cache directory is unavailable")?;

        let writable = fs::metadata(&app_cache_dir)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(format!(
                "Application cache directory {} is not writable",
                app_cache_dir.display()
            ));
        }

        let bucket = app_cache_dir.join(&self.root_dir_name).join(cache_name);
        fs::create_dir_all(&bucket)
            .map_err(|e| format!("Failed to create cache bucket {}: {}", bucket.display(), e))?;

        Ok(bucket)
    }

    fn write_content(path: &Path, entry: &mut CacheEntry) -> Result<(), String> {
        let mut file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        io::copy(&mut entry.data, &mut file)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        file.sync_all()
            .map_err(|e| format!("Failed to sync {}: {}", path.display(), e))?;
        Ok(())
    }

    fn write_metadata(content_path: &Path, entry: &CacheEntry) -> Result<(), String> {
        let mut metadata: HashMap<String, String> = entry.metadata.clone();
        metadata.insert(
            METADATA_KEY_PATH_TO_FILE.to_string(),
            content_path.to_string_lossy().into_owned(),
        );
        if let Some(expiry_ms) = entry.expiry.expiration_ms() {
            metadata.insert(
                METADATA_KEY_EXPIRY_IN_MILLIS.to_string(),
                expiry_ms.to_string(),
            );
        }

        let json = serde_json::to_string(&metadata)
            .map_err(|e| format!("Failed to serialize cache metadata: {}", e))?;
        let metadata_path = Self::metadata_location(content_path);
        fs::write(&metadata_path, json)
            .map_err(|e| format!("Failed to write {}: {}", metadata_path.display(), e))
    }

    fn read_metadata(content_path: &Path) -> Result<HashMap<String, String>, String> {
        let metadata_path = Self::metadata_location(content_path);
        let raw = fs::read_to_string(&metadata_path)
            .map_err(|e| format!("Failed to read {}: {}", metadata_path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse {}: {}", metadata_path.display(), e))
    }

    fn expiry_from_metadata(metadata: &HashMap<String, String>) -> CacheExpiry {
        match metadata.get(METADATA_KEY_EXPIRY_IN_MILLIS) {
            None => CacheExpiry::Never,
            Some(raw) => match raw.parse::<i64>() {
                Ok(ms) => CacheExpiry::At(ms),
                Err(_) => {
                    warn!("Unparseable cache expiry '{}', treating entry as expired", raw);
                    CacheExpiry::At(0)
                }
            },
        }
    }
}

/// Bucket names stay below the cache root: relative, no `.` or `..` parts.
fn is_bucket_name(cache_name: &str) -> bool {
    Path::new(cache_name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn remove_if_present(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

impl CacheService for FileCacheService {
    fn set(&self, cache_name: &str, key: &str, mut entry: CacheEntry) -> bool {
        if is_blank(cache_name) || is_blank(key) {
            debug!("Rejecting cache write with blank cache name or key");
            return false;
        }

        let bucket = match self.create_bucket(cache_name) {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };
        let content_path = bucket.join(sha256_hex(key));

        if let Err(e) = Self::write_content(&content_path, &mut entry) {
            // An overwrite may leave the previous entry's metadata behind
            warn!("{}", e);
            remove_if_present(&content_path);
            remove_if_present(&Self::metadata_location(&content_path));
            return false;
        }

        if let Err(e) = Self::write_metadata(&content_path, &entry) {
            // Content must never outlive a failed metadata write
            warn!("{}", e);
            remove_if_present(&content_path);
            return false;
        }

        true
    }

    fn get(&self, cache_name: &str, key: &str) -> Option<CacheResult> {
        let content_path = self.get_cache_location(cache_name, key)?;
        if !content_path.is_file() {
            return None;
        }

        let metadata = match Self::read_metadata(&content_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Corrupt cache entry for '{}' in '{}': {}", key, cache_name, e);
                self.remove(cache_name, key);
                return None;
            }
        };

        let expiry = Self::expiry_from_metadata(&metadata);
        if expiry.is_expired() {
            debug!("Cache entry for '{}' in '{}' has expired", key, cache_name);
            self.remove(cache_name, key);
            return None;
        }

        match File::open(&content_path) {
            Ok(file) => Some(CacheResult {
                file,
                path: content_path,
                expiry,
                metadata,
            }),
            Err(e) => {
                warn!("Failed to open {}: {}", content_path.display(), e);
                None
            }
        }
    }

    fn remove(&self, cache_name: &str, key: &str) -> bool {
        let content_path = match self.get_cache_location(cache_name, key) {
            Some(path) => path,
            None => return false,
        };

        let content_removed = remove_if_present(&content_path);
        let metadata_removed = remove_if_present(&Self::metadata_location(&content_path));
        content_removed && metadata_removed
    }
}
