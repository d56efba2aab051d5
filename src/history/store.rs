//! Event history orchestration on a single FIFO worker.
//!
//! All record/query/delete work is queued onto one named thread that owns the
//! database. Async callers await a oneshot reply; rule evaluation, which runs
//! synchronously, goes through [`HistoryLookup`] and blocks on the reply.

use super::database::EventHistoryDatabase;
use super::request::EventHistoryRequest;
use crate::event::Event;
use crate::types::now_ms;
use log::{debug, warn};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce(&EventHistoryDatabase) + Send>;

/// Synchronous history counts for rule conditions.
pub trait HistoryLookup: Send + Sync {
    /// Same semantics as [`EventHistory::get_events`].
    fn count_events(&self, requests: &[EventHistoryRequest], enforce_order: bool) -> i64;
}

/// Single-worker front end for the event history database.
pub struct EventHistory {
    sender: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for EventHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHistory")
            .field("worker_alive", &!self.sender.is_closed())
            .finish()
    }
}

impl EventHistory {
    /// Starts the worker thread, which takes ownership of `database`.
    ///
    /// The worker exits once the `EventHistory` is dropped and the queue drains.
    pub fn new(database: EventHistoryDatabase) -> Result<Self, String> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        thread::Builder::new()
            .name("event-history".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job(&database);
                }
                debug!("Event history worker stopped");
            })
            .map_err(|e| format!("Failed to start event history worker: {}", e))?;

        Ok(Self { sender })
    }

    fn submit(&self, job: Job) -> bool {
        if self.sender.send(job).is_err() {
            warn!("Event history worker is gone, dropping request");
            return false;
        }
        true
    }

    /// Queues `op` and waits for its result without blocking the executor.
    async fn run<T, F>(&self, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&EventHistoryDatabase) -> T + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let submitted = self.submit(Box::new(move |db| {
            if reply.send(op(db)).is_err() {
                debug!("Event history caller went away before the result was ready");
            }
        }));

        if !submitted {
            return None;
        }
        response.await.ok()
    }

    /// Queues `op` and blocks the calling thread for its result.
    fn run_blocking<T, F>(&self, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&EventHistoryDatabase) -> T + Send + 'static,
    {
        let (reply, response) = std_mpsc::sync_channel(1);
        let submitted = self.submit(Box::new(move |db| {
            if reply.send(op(db)).is_err() {
                debug!("Event history caller went away before the result was ready");
            }
        }));

        if !submitted {
            return None;
        }
        response.recv().ok()
    }

    // ============================================================================================
    // OPERATIONS
    // ============================================================================================

    /// Records the event's fingerprint.
    ///
    /// Returns `None` without queuing anything when the fingerprint is 0 (no
    /// data, or no masked key present). Otherwise `Some(inserted)`.
    pub async fn record_event(&self, event: &Event) -> Option<bool> {
        let hash = event.history_hash();
        if hash == 0 {
            debug!("Event '{}' has no fingerprint, not recording", event.name);
            return None;
        }

        Some(self.run(move |db| db.insert(hash)).await.unwrap_or(false))
    }

    /// Counts history matches for `requests`.
    ///
    /// Unordered: the sum of match counts across requests. Ordered: 1 when every
    /// request matched, each no earlier than the oldest match of the one before, else 0.
    pub async fn get_events(&self, requests: Vec<EventHistoryRequest>, enforce_order: bool) -> i64 {
        self.run(move |db| query_events(db, &requests, enforce_order))
            .await
            .unwrap_or(0)
    }

    /// Deletes history rows for `requests`, returning the total removed.
    pub async fn delete_events(&self, requests: Vec<EventHistoryRequest>) -> i64 {
        self.run(move |db| delete_events(db, &requests))
            .await
            .unwrap_or(0)
    }
}

impl HistoryLookup for EventHistory {
    fn count_events(&self, requests: &[EventHistoryRequest], enforce_order: bool) -> i64 {
        let requests = requests.to_vec();
        self.run_blocking(move |db| query_events(db, &requests, enforce_order))
            .unwrap_or(0)
    }
}

/// Resolves ranges and runs the per-request selects.
pub(crate) fn query_events(
    db: &EventHistoryDatabase,
    requests: &[EventHistoryRequest],
    enforce_order: bool,
) -> i64 {
    let now = now_ms();
    let mut total = 0;
    let mut matched = 0;
    let mut previous_oldest: Option<i64> = None;

    for request in requests {
        let from_ms = match previous_oldest {
            Some(oldest) if enforce_order => oldest,
            _ => request.from_ms,
        };
        let to_ms = if request.to_ms == 0 { now } else { request.to_ms };

        let result = db
            .select(request.mask_hash(), from_ms, to_ms)
            .unwrap_or_default();

        if enforce_order {
            if result.count == 0 {
                break;
            }
            matched += 1;
            previous_oldest = result.oldest_ms;
        } else {
            total += result.count;
        }
    }

    if enforce_order {
        i64::from(!requests.is_empty() && matched == requests.len())
    } else {
        total
    }
}

pub(crate) fn delete_events(db: &EventHistoryDatabase, requests: &[EventHistoryRequest]) -> i64 {
    let now = now_ms();
    requests
        .iter()
        .map(|request| {
            let to_ms = if request.to_ms == 0 { now } else { request.to_ms };
            db.delete(request.mask_hash(), request.from_ms, to_ms)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::map_to_fnv1a_hash;
    use serde_json::{json, Map, Value};

    fn mask(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn create_test_database() -> (tempfile::TempDir, EventHistoryDatabase) {
        let tmp_dir = tempfile::tempdir().unwrap();
        let db = EventHistoryDatabase::open_at(tmp_dir.path().join("history.db")).unwrap();
        (tmp_dir, db)
    }

    #[test]
    fn test_unordered_query_sums_counts() {
        let (_tmp, db) = create_test_database();
        let h1 = map_to_fnv1a_hash(&mask(json!({"k": "one"})), None);
        let h2 = map_to_fnv1a_hash(&mask(json!({"k": "two"})), None);
        for ts in 0..5 {
            db.insert_at(h1, 1_000 + ts);
        }
        for ts in 0..10 {
            db.insert_at(h2, 2_000 + ts);
        }

        let requests = vec![
            EventHistoryRequest::new(mask(json!({"k": "one"})), 0, 0),
            EventHistoryRequest::new(mask(json!({"k": "two"})), 0, 0),
        ];
        assert_eq!(query_events(&db, &requests, false), 15);
    }

    #[test]
    fn test_ordered_query_requires_sequence() {
        let (_tmp, db) = create_test_database();
        let h1 = map_to_fnv1a_hash(&mask(json!({"k": "one"})), None);
        let h2 = map_to_fnv1a_hash(&mask(json!({"k": "two"})), None);
        db.insert_at(h1, 1_000);
        db.insert_at(h2, 2_000);

        let forward = vec![
            EventHistoryRequest::new(mask(json!({"k": "one"})), 0, 0),
            EventHistoryRequest::new(mask(json!({"k": "two"})), 0, 0),
        ];
        assert_eq!(query_events(&db, &forward, true), 1);

        let backward = vec![
            EventHistoryRequest::new(mask(json!({"k": "two"})), 0, 0),
            EventHistoryRequest::new(mask(json!({"k": "one"})), 0, 0),
        ];
        assert_eq!(query_events(&db, &backward, true), 0);
    }

    #[test]
    fn test_ordered_query_follows_insertion_order() {
        let h1 = map_to_fnv1a_hash(&mask(json!({"k": "one"})), None);
        let h2 = map_to_fnv1a_hash(&mask(json!({"k": "two"})), None);
        let requests = vec![
            EventHistoryRequest::new(mask(json!({"k": "one"})), 0, 0),
            EventHistoryRequest::new(mask(json!({"k": "two"})), 0, 0),
        ];

        let (_tmp, db) = create_test_database();
        for ts in 0..5 {
            db.insert_at(h1, 1_000 + ts);
        }
        for ts in 0..10 {
            db.insert_at(h2, 2_000 + ts);
        }
        assert_eq!(query_events(&db, &requests, true), 1);

        let (_tmp, db) = create_test_database();
        for ts in 0..10 {
            db.insert_at(h2, 1_000 + ts);
        }
        for ts in 0..5 {
            db.insert_at(h1, 2_000 + ts);
        }
        assert_eq!(query_events(&db, &requests, true), 0);
    }

    #[test]
    fn test_ordered_query_with_no_requests_is_zero() {
        let (_tmp, db) = create_test_database();
        assert_eq!(query_events(&db, &[], true), 0);
        assert_eq!(query_events(&db, &[], false), 0);
    }

    #[test]
    fn test_explicit_range_bounds_the_query() {
        let (_tmp, db) = create_test_database();
        let hash = map_to_fnv1a_hash(&mask(json!({"k": "one"})), None);
        db.insert_at(hash, 1_000);
        db.insert_at(hash, 5_000);

        let requests = vec![EventHistoryRequest::new(mask(json!({"k": "one"})), 2_000, 6_000)];
        assert_eq!(query_events(&db, &requests, false), 1);
    }

    #[test]
    fn test_delete_sums_across_requests() {
        let (_tmp, db) = create_test_database();
        let h1 = map_to_fnv1a_hash(&mask(json!({"k": "one"})), None);
        let h2 = map_to_fnv1a_hash(&mask(json!({"k": "two"})), None);
        db.insert_at(h1, 1_000);
        db.insert_at(h1, 1_001);
        db.insert_at(h2, 1_002);

        let requests = vec![
            EventHistoryRequest::new(mask(json!({"k": "one"})), 0, 0),
            EventHistoryRequest::new(mask(json!({"k": "two"})), 0, 0),
        ];
        assert_eq!(delete_events(&db, &requests), 3);
        assert_eq!(db.row_count(), 0);
    }

    #[tokio::test]
    async fn test_record_skips_zero_hash() {
        let (_tmp, db) = create_test_database();
        let history = EventHistory::new(db).unwrap();

        let empty = Event::builder("empty", "type", "source").build();
        assert_eq!(history.record_event(&empty).await, None);

        let masked_out = Event::builder("masked", "type", "source")
            .data(mask(json!({"a": 1})))
            .mask(vec!["missing".to_string()])
            .build();
        assert_eq!(history.record_event(&masked_out).await, None);

        let event = Event::builder("real", "type", "source")
            .data(mask(json!({"a": 1})))
            .build();
        assert_eq!(history.record_event(&event).await, Some(true));
    }

    #[tokio::test]
    async fn test_blocking_lookup_shares_the_queue() {
        let (_tmp, db) = create_test_database();
        let history = EventHistory::new(db).unwrap();
        let event = Event::builder("real", "type", "source")
            .data(mask(json!({"a": 1})))
            .build();
        assert_eq!(history.record_event(&event).await, Some(true));

        let requests = vec![EventHistoryRequest::new(mask(json!({"a": 1})), 0, 0)];
        let count = tokio::task::spawn_blocking(move || history.count_events(&requests, false))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lookup_runs_after_queued_records() {
        let (_tmp, db) = create_test_database();
        let history = EventHistory::new(db).unwrap();
        let event = Event::builder("real", "type", "source")
            .data(mask(json!({"a": 1})))
            .build();
        assert_eq!(history.record_event(&event).await, Some(true));
        assert_eq!(history.record_event(&event).await, Some(true));

        let lookup: &dyn HistoryLookup = &history;
        let requests = vec![EventHistoryRequest::new(mask(json!({"a": 1})), 0, 0)];
        assert_eq!(lookup.count_events(&requests, false), 2);
        assert_eq!(lookup.count_events(&requests, true), 1);
    }
}
