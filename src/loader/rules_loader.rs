//! Rules loader - download or read a rules bundle and cache its `rules.json`.

use super::http_date::{parse_rfc2822, to_rfc2822_gmt};
use super::result::{RulesLoadReason, RulesLoadResult};
use super::zip_bundle::extract_rules_json;
use crate::cache::{CacheEntry, CacheExpiry, CacheService};
use crate::config::CoreConfig;
use crate::hashing::sha256_hex;
use crate::services::{DeviceInforming, HttpConnection, NetworkRequest, Networking};
use crate::types::is_blank;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const HTTP_HEADER_ETAG: &str = "ETag";
pub const HTTP_HEADER_LAST_MODIFIED: &str = "Last-Modified";
pub const HTTP_HEADER_IF_NONE_MATCH: &str = "If-None-Match";
pub const HTTP_HEADER_IF_MODIFIED_SINCE: &str = "If-Modified-Since";

const HTTP_OK: u16 = 200;
const HTTP_NOT_MODIFIED: u16 = 304;

const STAGED_ZIP_NAME: &str = "rules.zip";

/// Loads rules bundles into a single cache bucket.
///
/// Loads for different keys stage in different directories. Two concurrent
/// loads of the same key share a staging directory and may race on its
/// contents; callers serialize same-key loads if they need to.
pub struct RulesLoader {
    cache_name: String,
    cache: Arc<dyn CacheService>,
    device: Arc<dyn DeviceInforming>,
    networking: Arc<dyn Networking>,
    config: CoreConfig,
}

impl RulesLoader {
    pub fn new(
        cache_name: impl Into<String>,
        cache: Arc<dyn CacheService>,
        device: Arc<dyn DeviceInforming>,
        networking: Arc<dyn Networking>,
        config: CoreConfig,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            cache,
            device,
            networking,
            config,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    // ============================================================================================
    // LOAD OPERATIONS
    // ============================================================================================

    /// Downloads the bundle at `url`, revalidating against any cached copy.
    pub async fn load_from_url(&self, url: &str) -> RulesLoadResult {
        if is_blank(url) || reqwest::Url::parse(url).is_err() {
            warn!("Cannot load rules from invalid url '{}'", url);
            return RulesLoadResult::failure(RulesLoadReason::InvalidSource);
        }

        let request = NetworkRequest::get(
            url,
            self.conditional_headers(url),
            self.config.connect_timeout,
            self.config.read_timeout,
        );

        let connection = match self.networking.connect(request).await {
            Some(connection) => connection,
            None => {
                warn!("No response while downloading rules from {}", url);
                return RulesLoadResult::failure(RulesLoadReason::NoData);
            }
        };

        match connection.response_code {
            HTTP_OK => {
                let metadata = Self::metadata_from_response(&connection);
                self.extract_and_cache(url, Cursor::new(connection.body), metadata)
            }
            HTTP_NOT_MODIFIED => {
                debug!("Rules at {} not modified", url);
                RulesLoadResult::failure(RulesLoadReason::NotModified)
            }
            code => {
                warn!("Unexpected response code {} downloading rules from {}", code, url);
                RulesLoadResult::failure(RulesLoadReason::NoData)
            }
        }
    }

    /// Reads a bundled asset and caches its rules under the asset name.
    pub fn load_from_asset(&self, asset_name: &str) -> RulesLoadResult {
        if is_blank(asset_name) {
            return RulesLoadResult::failure(RulesLoadReason::InvalidSource);
        }

        match self.device.asset(asset_name) {
            Some(stream) => self.extract_and_cache(asset_name, stream, HashMap::new()),
            None => {
                warn!("Bundled rules asset '{}' not found", asset_name);
                RulesLoadResult::failure(RulesLoadReason::InvalidSource)
            }
        }
    }

    /// Returns previously cached rules for a url or asset name, without network or zip work.
    pub fn load_from_cache(&self, key: &str) -> RulesLoadResult {
        if is_blank(key) {
            return RulesLoadResult::failure(RulesLoadReason::InvalidSource);
        }

        let mut cached = match self.cache.get(&self.cache_name, key) {
            Some(cached) => cached,
            None => return RulesLoadResult::failure(RulesLoadReason::NoData),
        };

        match cached.read_to_string() {
            Ok(content) => RulesLoadResult::success(content),
            Err(e) => {
                warn!("{}", e);
                RulesLoadResult::failure(RulesLoadReason::NoData)
            }
        }
    }

    // ============================================================================================
    // CONDITIONAL FETCH
    // ============================================================================================

    /// Validators from the cached copy of `url`. Empty when nothing is cached.
    fn conditional_headers(&self, url: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        let cached = match self.cache.get(&self.cache_name, url) {
            Some(cached) => cached,
            None => return headers,
        };

        let etag = cached
            .metadata
            .get(HTTP_HEADER_ETAG)
            .cloned()
            .unwrap_or_default();
        let last_modified_ms = cached
            .metadata
            .get(HTTP_HEADER_LAST_MODIFIED)
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        headers.insert(HTTP_HEADER_IF_NONE_MATCH.to_string(), etag);
        headers.insert(
            HTTP_HEADER_IF_MODIFIED_SINCE.to_string(),
            to_rfc2822_gmt(last_modified_ms),
        );
        headers
    }

    fn metadata_from_response(connection: &HttpConnection) -> HashMap<String, String> {
        let last_modified_ms = connection
            .response_property_for(HTTP_HEADER_LAST_MODIFIED)
            .and_then(parse_rfc2822)
            .unwrap_or(0);
        let etag = connection
            .response_property_for(HTTP_HEADER_ETAG)
            .unwrap_or_default();

        let mut metadata = HashMap::new();
        metadata.insert(
            HTTP_HEADER_LAST_MODIFIED.to_string(),
            last_modified_ms.to_string(),
        );
        metadata.insert(HTTP_HEADER_ETAG.to_string(), etag.to_string());
        metadata
    }

    // ============================================================================================
    // STAGING AND EXTRACTION
    // ============================================================================================

    /// `<appCacheDir>/<tempDirName>/<sha256(key)>`
    fn temp_dir_for(&self, key: &str) -> Option<PathBuf> {
        self.device
            .application_cache_dir()
            .map(|dir| dir.join(&self.config.temp_dir_name).join(sha256_hex(key)))
    }

    fn create_temp_dir(&self, key: &str) -> Result<PathBuf, String> {
        let temp_dir = self
            .temp_dir_for(key)
            .ok_or("Application cache directory is unavailable")?;

        // Leftovers from an earlier load of the same key
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir)
                .map_err(|e| format!("Failed to clear {}: {}", temp_dir.display(), e))?;
        }

        fs::create_dir_all(&temp_dir)
            .map_err(|e| format!("Failed to create {}: {}", temp_dir.display(), e))?;
        Ok(temp_dir)
    }

    fn store_bundle(temp_dir: &Path, mut stream: impl Read) -> Result<PathBuf, String> {
        let zip_path = temp_dir.join(STAGED_ZIP_NAME);
        let mut file = File::create(&zip_path)
            .map_err(|e| format!("Failed to create {}: {}", zip_path.display(), e))?;
        io::copy(&mut stream, &mut file)
            .map_err(|e| format!("Failed to write {}: {}", zip_path.display(), e))?;
        Ok(zip_path)
    }

    fn extract_and_cache(
        &self,
        key: &str,
        stream: impl Read,
        metadata: HashMap<String, String>,
    ) -> RulesLoadResult {
        let temp_dir = match self.create_temp_dir(key) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("{}", e);
                return RulesLoadResult::failure(RulesLoadReason::CannotCreateTempDir);
            }
        };

        let result = self.process_bundle(key, &temp_dir, stream, metadata);

        if let Err(e) = fs::remove_dir_all(&temp_dir) {
            warn!("Failed to clean up {}: {}", temp_dir.display(), e);
        }

        result
    }

    fn process_bundle(
        &self,
        key: &str,
        temp_dir: &Path,
        stream: impl Read,
        metadata: HashMap<String, String>,
    ) -> RulesLoadResult {
        let zip_path = match Self::store_bundle(temp_dir, stream) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                return RulesLoadResult::failure(RulesLoadReason::CannotStoreInTempDir);
            }
        };

        let content = match extract_rules_json(&zip_path, temp_dir) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to extract rules for '{}': {}", key, e);
                return RulesLoadResult::failure(RulesLoadReason::ZipExtractionFailed);
            }
        };

        let entry = CacheEntry::from_bytes(content.clone(), CacheExpiry::Never, metadata);
        if !self.cache.set(&self.cache_name, key, entry) {
            warn!("Failed to cache rules for '{}'", key);
        }

        RulesLoadResult::success(content)
    }
}
