//! Directory names, file names and HTTP timeouts shared by the core components.

use std::time::Duration;

/// Default cache root under the application cache directory.
pub const DEFAULT_CACHE_ROOT_DIR: &str = "aepsdkcache";
/// Default staging directory for rules bundles.
pub const DEFAULT_TEMP_DIR: &str = "aepsdktmp";
/// Event history database file name inside the databases directory.
pub const DEFAULT_HISTORY_DATABASE: &str = "com.adobe.module.core.eventhistory";
/// Pre-migration event history file name inside the cache directory.
pub const LEGACY_HISTORY_DATABASE: &str = "EventHistory";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the core services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    /// Name of the cache root directory under the application cache dir
    pub cache_root_dir_name: String,
    /// Name of the rules staging directory under the application cache dir
    pub temp_dir_name: String,
    /// Event history database file name
    pub history_database_name: String,
    /// Legacy event history file name, migrated on first open
    pub legacy_history_database_name: String,
    /// Connect timeout for outbound rules downloads
    pub connect_timeout: Duration,
    /// Read timeout for outbound rules downloads
    pub read_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache_root_dir_name: DEFAULT_CACHE_ROOT_DIR.to_string(),
            temp_dir_name: DEFAULT_TEMP_DIR.to_string(),
            history_database_name: DEFAULT_HISTORY_DATABASE.to_string(),
            legacy_history_database_name: LEGACY_HISTORY_DATABASE.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CoreConfig {
    /// Defaults with overrides from the environment.
    ///
    /// - `MOBILE_CORE_CACHE_ROOT`: cache root directory name
    /// - `MOBILE_CORE_TEMP_DIR`: rules staging directory name
    /// - `MOBILE_CORE_HTTP_TIMEOUT_SECS`: connect and read timeout
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("MOBILE_CORE_CACHE_ROOT") {
            if !root.trim().is_empty() {
                config.cache_root_dir_name = root;
            }
        }

        if let Ok(temp) = std::env::var("MOBILE_CORE_TEMP_DIR") {
            if !temp.trim().is_empty() {
                config.temp_dir_name = temp;
            }
        }

        if let Ok(secs) = std::env::var("MOBILE_CORE_HTTP_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    config.connect_timeout = Duration::from_secs(secs);
                    config.read_timeout = Duration::from_secs(secs);
                }
                _ => log::warn!("Ignoring invalid MOBILE_CORE_HTTP_TIMEOUT_SECS '{}'", secs),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.cache_root_dir_name, "aepsdkcache");
        assert_eq!(config.temp_dir_name, "aepsdktmp");
        assert_eq!(
            config.history_database_name,
            "com.adobe.module.core.eventhistory"
        );
        assert_eq!(config.legacy_history_database_name, "EventHistory");
        assert_eq!(config.connect_timeout.as_secs(), 10);
        assert_eq!(config.read_timeout.as_secs(), 10);
    }
}
