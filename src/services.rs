//! Platform collaborators handed to the core components.
//!
//! The host supplies device directories, bundled assets and an HTTP stack.
//! `LocalDeviceInfo` and `ReqwestNetworking` are the plain-filesystem and
//! reqwest-backed implementations.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

// ================================================================================================
// DEVICE INFORMATION
// ================================================================================================

/// Directory and asset access provided by the host platform.
pub trait DeviceInforming: Send + Sync {
    /// Application cache directory. `None` when the platform has none.
    fn application_cache_dir(&self) -> Option<PathBuf>;

    /// Directory where the platform keeps databases.
    fn application_database_dir(&self) -> Option<PathBuf>;

    /// Opens a bundled asset by name.
    fn asset(&self, name: &str) -> Option<Box<dyn Read + Send>>;
}

/// `DeviceInforming` over plain directories.
#[derive(Clone, Debug)]
pub struct LocalDeviceInfo {
    pub cache_dir: Option<PathBuf>,
    pub database_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
}

impl LocalDeviceInfo {
    /// Uses `root/cache`, `root/databases` and `root/assets`.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            cache_dir: Some(root.join("cache")),
            database_dir: Some(root.join("databases")),
            assets_dir: Some(root.join("assets")),
        }
    }
}

impl DeviceInforming for LocalDeviceInfo {
    fn application_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.clone()
    }

    fn application_database_dir(&self) -> Option<PathBuf> {
        self.database_dir.clone()
    }

    fn asset(&self, name: &str) -> Option<Box<dyn Read + Send>> {
        let assets_dir = self.assets_dir.as_ref()?;
        let relative = Path::new(name);

        // Assets are addressed relative to the assets dir only
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            warn!("Rejecting asset name '{}'", name);
            return None;
        }

        match File::open(assets_dir.join(relative)) {
            Ok(file) => Some(Box::new(file)),
            Err(e) => {
                debug!("Asset '{}' unavailable: {}", name, e);
                None
            }
        }
    }
}

// ================================================================================================
// NETWORKING
// ================================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outbound HTTP request.
#[derive(Clone, Debug)]
pub struct NetworkRequest {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<Vec<u8>>,
    pub headers: HashMap<String, String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl NetworkRequest {
    /// GET request with the given headers and timeouts.
    pub fn get(
        url: impl Into<String>,
        headers: HashMap<String, String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            headers,
            connect_timeout,
            read_timeout,
        }
    }
}

/// Completed HTTP exchange.
#[derive(Clone, Debug, Default)]
pub struct HttpConnection {
    pub response_code: u16,
    /// Response headers, keys lowercased
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpConnection {
    pub fn new(response_code: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            response_code,
            headers,
            body,
        }
    }

    /// Case-insensitive response header lookup.
    pub fn response_property_for(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP stack supplied by the host.
///
/// Implementations return `None` when no response was received at all
/// (DNS, connect, TLS or timeout failures).
#[async_trait]
pub trait Networking: Send + Sync {
    async fn connect(&self, request: NetworkRequest) -> Option<HttpConnection>;
}

/// `Networking` over reqwest.
#[derive(Debug, Default)]
pub struct ReqwestNetworking;

impl ReqwestNetworking {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Networking for ReqwestNetworking {
    async fn connect(&self, request: NetworkRequest) -> Option<HttpConnection> {
        let client = match reqwest::Client::builder()
            .connect_timeout(request.connect_timeout)
            .timeout(request.connect_timeout + request.read_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client: {}", e);
                return None;
            }
        };

        let mut builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", request.url, e);
                return None;
            }
        };

        let response_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                warn!("Failed to read response body from {}: {}", request.url, e);
                return None;
            }
        };

        Some(HttpConnection::new(response_code, headers, body))
    }
}
