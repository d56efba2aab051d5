//! SQLite accessor for the event history table.
//!
//! Every operation opens a fresh connection, runs one statement and closes it,
//! all while holding the instance lock. There is no pooled connection and no
//! atomicity across calls.

use crate::config::CoreConfig;
use crate::services::DeviceInforming;
use crate::types::now_ms;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

const CREATE_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS Events (eventHash INTEGER, timestamp INTEGER)";
const INSERT_SQL: &str = "INSERT INTO Events (eventHash, timestamp) VALUES (?1, ?2)";
const SELECT_SQL: &str = "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM Events \
                          WHERE eventHash = ?1 AND timestamp >= ?2 AND timestamp <= ?3";
const DELETE_SQL: &str =
    "DELETE FROM Events WHERE eventHash = ?1 AND timestamp >= ?2 AND timestamp <= ?3";
const COUNT_SQL: &str = "SELECT COUNT(*) FROM Events";

/// Aggregate over the rows matching one hash and time range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventHistoryQueryResult {
    pub count: i64,
    /// Earliest matching timestamp, `None` when nothing matched
    pub oldest_ms: Option<i64>,
    /// Latest matching timestamp, `None` when nothing matched
    pub newest_ms: Option<i64>,
}

/// Event fingerprint store backed by a single SQLite file.
#[derive(Debug)]
pub struct EventHistoryDatabase {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventHistoryDatabase {
    /// Opens the database in the platform databases directory.
    ///
    /// A legacy database in the cache directory is moved into place when the
    /// new file does not exist yet.
    pub fn open(device: &dyn DeviceInforming, config: &CoreConfig) -> Result<Self, String> {
        let database_dir = device
            .application_database_dir()
            .ok_or("Application database directory is unavailable")?;
        fs::create_dir_all(&database_dir).map_err(|e| {
            format!(
                "Failed to create database directory {}: {}",
                database_dir.display(),
                e
            )
        })?;

        let path = database_dir.join(&config.history_database_name);
        if !path.exists() {
            if let Some(cache_dir) = device.application_cache_dir() {
                let legacy = cache_dir.join(&config.legacy_history_database_name);
                if legacy.is_file() {
                    Self::migrate_legacy(&legacy, &path);
                }
            }
        }

        Self::open_at(path)
    }

    /// Opens (creating if needed) the database at an explicit path.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }

        let database = Self {
            path,
            lock: Mutex::new(()),
        };
        database.with_connection(|conn| conn.execute(CREATE_TABLE_SQL, []))?;
        Ok(database)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn migrate_legacy(legacy: &Path, target: &Path) {
        match fs::rename(legacy, target) {
            Ok(()) => info!(
                "Migrated event history from {} to {}",
                legacy.display(),
                target.display()
            ),
            // Cache and database dirs can sit on different filesystems
            Err(rename_err) => match fs::copy(legacy, target) {
                Ok(_) => {
                    if let Err(e) = fs::remove_file(legacy) {
                        warn!("Failed to delete legacy event history: {}", e);
                    }
                    info!("Copied legacy event history to {}", target.display());
                }
                Err(copy_err) => warn!(
                    "Failed to migrate legacy event history ({}; {})",
                    rename_err, copy_err
                ),
            },
        }
    }

    /// Runs `f` on a fresh connection while holding the instance lock.
    ///
    /// The connection is closed before the lock is released on every path.
    fn with_connection<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let _guard = self.lock.lock();
        let conn = Connection::open(&self.path)
            .map_err(|e| format!("Failed to open {}: {}", self.path.display(), e))?;
        f(&conn).map_err(|e| format!("Event history statement failed: {}", e))
    }

    // ============================================================================================
    // OPERATIONS
    // ============================================================================================

    /// Appends `(hash, now)`.
    pub fn insert(&self, hash: i64) -> bool {
        self.insert_at(hash, now_ms())
    }

    /// Appends `(hash, timestamp_ms)`.
    pub fn insert_at(&self, hash: i64, timestamp_ms: i64) -> bool {
        match self.with_connection(|conn| conn.execute(INSERT_SQL, params![hash, timestamp_ms])) {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to insert event hash {}: {}", hash, e);
                false
            }
        }
    }

    /// Count and timestamp bounds for `hash` within `[from_ms, to_ms]`.
    ///
    /// A `to_ms` of 0 is read as now.
    pub fn select(&self, hash: i64, from_ms: i64, to_ms: i64) -> Option<EventHistoryQueryResult> {
        let to_ms = if to_ms == 0 { now_ms() } else { to_ms };

        let result = self.with_connection(|conn| {
            conn.query_row(SELECT_SQL, params![hash, from_ms, to_ms], |row| {
                Ok(EventHistoryQueryResult {
                    count: row.get(0)?,
                    oldest_ms: row.get(1)?,
                    newest_ms: row.get(2)?,
                })
            })
        });

        match result {
            Ok(result) => {
                debug!(
                    "Event hash {} in [{}, {}]: {} match(es)",
                    hash, from_ms, to_ms, result.count
                );
                Some(result)
            }
            Err(e) => {
                error!("Failed to query event hash {}: {}", hash, e);
                None
            }
        }
    }

    /// Deletes rows for `hash` within `[from_ms, to_ms]`, returning how many went.
    ///
    /// A `to_ms` of 0 is read as now.
    pub fn delete(&self, hash: i64, from_ms: i64, to_ms: i64) -> i64 {
        let to_ms = if to_ms == 0 { now_ms() } else { to_ms };

        match self.with_connection(|conn| conn.execute(DELETE_SQL, params![hash, from_ms, to_ms])) {
            Ok(deleted) => deleted as i64,
            Err(e) => {
                error!("Failed to delete event hash {}: {}", hash, e);
                0
            }
        }
    }

    /// Total number of rows.
    pub fn row_count(&self) -> i64 {
        self.with_connection(|conn| conn.query_row(COUNT_SQL, [], |row| row.get(0)))
            .unwrap_or_else(|e| {
                error!("Failed to count event history rows: {}", e);
                0
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LocalDeviceInfo;

    fn create_test_database() -> (tempfile::TempDir, EventHistoryDatabase) {
        let tmp_dir = tempfile::tempdir().unwrap();
        let db = EventHistoryDatabase::open_at(tmp_dir.path().join("history.db")).unwrap();
        (tmp_dir, db)
    }

    #[test]
    fn test_insert_and_select() {
        let (_tmp, db) = create_test_database();
        assert!(db.insert_at(111, 1_000));
        assert!(db.insert_at(111, 2_000));
        assert!(db.insert_at(111, 3_000));
        assert!(db.insert_at(222, 2_500));

        let result = db.select(111, 0, 0).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.oldest_ms, Some(1_000));
        assert_eq!(result.newest_ms, Some(3_000));

        let bounded = db.select(111, 1_500, 2_500).unwrap();
        assert_eq!(bounded.count, 1);
        assert_eq!(bounded.oldest_ms, Some(2_000));
    }

    #[test]
    fn test_select_without_matches() {
        let (_tmp, db) = create_test_database();
        let result = db.select(999, 0, 0).unwrap();
        assert_eq!(result, EventHistoryQueryResult::default());
    }

    #[test]
    fn test_duplicate_hashes_are_distinct_rows() {
        let (_tmp, db) = create_test_database();
        assert!(db.insert(7));
        assert!(db.insert(7));
        assert_eq!(db.select(7, 0, 0).unwrap().count, 2);
        assert_eq!(db.row_count(), 2);
    }

    #[test]
    fn test_delete_all_for_hash() {
        let (_tmp, db) = create_test_database();
        for ts in 1..=5 {
            db.insert_at(1, ts * 100);
        }
        db.insert_at(2, 100);

        assert_eq!(db.delete(1, 0, 0), 5);
        assert_eq!(db.row_count(), 1);
        assert_eq!(db.delete(1, 0, 0), 0);
    }

    #[test]
    fn test_delete_respects_range() {
        let (_tmp, db) = create_test_database();
        for ts in 1..=5 {
            db.insert_at(1, ts * 100);
        }

        assert_eq!(db.delete(1, 200, 400), 3);
        let remaining = db.select(1, 0, 0).unwrap();
        assert_eq!(remaining.count, 2);
        assert_eq!(remaining.oldest_ms, Some(100));
        assert_eq!(remaining.newest_ms, Some(500));
    }

    #[test]
    fn test_failures_degrade_to_values() {
        let (_tmp, db) = create_test_database();
        // Replace the database file with a directory so every open fails
        fs::remove_file(db.path()).unwrap();
        fs::create_dir_all(db.path()).unwrap();

        assert!(!db.insert(1));
        assert!(db.select(1, 0, 0).is_none());
        assert_eq!(db.delete(1, 0, 0), 0);
        assert_eq!(db.row_count(), 0);
    }

    #[test]
    fn test_open_migrates_legacy_database() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let device = LocalDeviceInfo::rooted_at(tmp_dir.path());
        let config = CoreConfig::default();

        // Seed a legacy database in the cache dir
        let legacy_path = tmp_dir.path().join("cache").join("EventHistory");
        {
            let legacy = EventHistoryDatabase::open_at(&legacy_path).unwrap();
            assert!(legacy.insert_at(42, 1_000));
        }

        let db = EventHistoryDatabase::open(&device, &config).unwrap();
        assert_eq!(
            db.path(),
            tmp_dir
                .path()
                .join("databases")
                .join("com.adobe.module.core.eventhistory")
        );
        assert!(!legacy_path.exists());
        assert_eq!(db.select(42, 0, 0).unwrap().count, 1);
    }

    #[test]
    fn test_open_keeps_existing_database_over_legacy() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let device = LocalDeviceInfo::rooted_at(tmp_dir.path());
        let config = CoreConfig::default();

        {
            let current = EventHistoryDatabase::open(&device, &config).unwrap();
            assert!(current.insert_at(1, 1_000));
        }
        let legacy_path = tmp_dir.path().join("cache").join("EventHistory");
        {
            let legacy = EventHistoryDatabase::open_at(&legacy_path).unwrap();
            assert!(legacy.insert_at(2, 1_000));
        }

        let db = EventHistoryDatabase::open(&device, &config).unwrap();
        assert!(legacy_path.exists());
        assert_eq!(db.select(1, 0, 0).unwrap().count, 1);
        assert_eq!(db.select(2, 0, 0).unwrap().count, 0);
    }

    #[test]
    fn test_open_without_database_dir_fails() {
        let device = LocalDeviceInfo {
            cache_dir: None,
            database_dir: None,
            assets_dir: None,
        };
        assert!(EventHistoryDatabase::open(&device, &CoreConfig::default()).is_err());
    }
}
