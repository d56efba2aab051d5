//! Cache data structures and traits.
//!
//! Defines the entry written by callers, the result handed back on reads,
//! and the expiry policy shared by both.

use crate::types::now_ms;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

/// When a cache entry stops being served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheExpiry {
    /// Served until explicitly removed
    Never,
    /// Expires at the given epoch millis
    At(i64),
}

impl CacheExpiry {
    /// Expiry `duration` from now.
    pub fn after(duration: Duration) -> Self {
        CacheExpiry::At(now_ms().saturating_add(duration.as_millis() as i64))
    }

    /// Epoch millis of the expiry, if any.
    pub fn expiration_ms(&self) -> Option<i64> {
        match self {
            CacheExpiry::Never => None,
            CacheExpiry::At(ms) => Some(*ms),
        }
    }

    /// Evaluated against the current time at the moment of the call.
    pub fn is_expired(&self) -> bool {
        match self {
            CacheExpiry::Never => false,
            CacheExpiry::At(ms) => *ms <= now_ms(),
        }
    }
}

/// Content to be stored in the cache.
pub struct CacheEntry {
    pub data: Box<dyn Read + Send>,
    pub expiry: CacheExpiry,
    pub metadata: HashMap<String, String>,
}

impl CacheEntry {
    pub fn new(
        data: impl Read + Send + 'static,
        expiry: CacheExpiry,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            data: Box::new(data),
            expiry,
            metadata,
        }
    }

    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        expiry: CacheExpiry,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self::new(Cursor::new(bytes.into()), expiry, metadata)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("expiry", &self.expiry)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A live cache hit.
#[derive(Debug)]
pub struct CacheResult {
    /// Open handle on the content file
    pub file: File,
    pub path: PathBuf,
    pub expiry: CacheExpiry,
    /// Full metadata, including the keys the cache injects
    pub metadata: HashMap<String, String>,
}

impl CacheResult {
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        self.file
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read cached file {}: {}", self.path.display(), e))?;
        Ok(buf)
    }

    pub fn read_to_string(&mut self) -> Result<String, String> {
        let mut buf = String::new();
        self.file
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read cached file {}: {}", self.path.display(), e))?;
        Ok(buf)
    }
}

/// Keyed, bucketed cache.
///
/// Implementations never panic or return errors: a failed write is `false`,
/// a miss or unreadable entry is `None`.
pub trait CacheService: Send + Sync {
    fn set(&self, cache_name: &str, key: &str, entry: CacheEntry) -> bool;

    fn get(&self, cache_name: &str, key: &str) -> Option<CacheResult>;

    fn remove(&self, cache_name: &str, key: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_in_future_is_live() {
        assert!(!CacheExpiry::after(Duration::from_secs(60)).is_expired());
        assert!(!CacheExpiry::Never.is_expired());
    }

    #[test]
    fn test_expiry_in_past_is_expired() {
        assert!(CacheExpiry::At(now_ms() - 1000).is_expired());
        assert!(CacheExpiry::At(0).is_expired());
    }

    #[test]
    fn test_expiration_ms() {
        assert_eq!(CacheExpiry::Never.expiration_ms(), None);
        assert_eq!(CacheExpiry::At(42).expiration_ms(), Some(42));
    }
}
