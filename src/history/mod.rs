//! Event history - an append-only ledger of event fingerprints.
//!
//! Two layers:
//! - **database**: `Events(eventHash INTEGER, timestamp INTEGER)` in SQLite, one
//!   connection per call under a coarse per-instance lock
//! - **store**: `EventHistory` runs every record/query/delete on one dedicated
//!   worker thread, so results come back in submission order
//!
//! Ordered queries chain requests: each request's lower bound becomes the
//! oldest match of the request before it.

pub mod database;
pub mod request;
pub mod store;

pub use database::{EventHistoryDatabase, EventHistoryQueryResult};
pub use request::EventHistoryRequest;
pub use store::{EventHistory, HistoryLookup};
