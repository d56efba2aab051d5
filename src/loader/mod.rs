//! Rules bundle loading.
//!
//! Fetches a zipped rules bundle (conditional HTTP download or bundled asset),
//! stages it in a per-key temp directory, extracts `rules.json` and commits the
//! text to the cache so later loads and conditional requests can reuse it.
//!
//! ```text
//! START -> fetch | asset -> temp dir -> store zip -> extract -> cache -> cleanup -> SUCCESS
//! ```
//! Any step can end the load early with the most specific [`RulesLoadReason`].

pub mod http_date;
pub mod result;
pub mod rules_loader;
pub mod zip_bundle;

pub use result::{RulesLoadReason, RulesLoadResult};
pub use rules_loader::RulesLoader;
