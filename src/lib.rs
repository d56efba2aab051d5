//! # Mobile Core
//!
//! Embeddable core services for a tagging/analytics client:
//!
//! - **File cache**: content + JSON metadata file pairs with expiry-aware reads
//! - **Rules loader**: conditional download or bundled asset, zip staging and extraction
//! - **Event history**: FNV-1a fingerprint ledger over SQLite with ordered/unordered queries
//! - **Rules engine**: token templating and a Comparison/Logical/Unary expression tree
//!
//! The host (an event hub or extension framework) owns the components and hands each
//! one its collaborators explicitly: a [`services::DeviceInforming`] for directories and
//! bundled assets, a [`services::Networking`] for HTTP, and a [`cache::CacheService`].

pub mod cache;
pub mod config;
pub mod event;
pub mod hashing;
pub mod history;
pub mod loader;
pub mod rules;
pub mod services;
pub mod types;

pub use cache::{CacheEntry, CacheExpiry, CacheResult, CacheService, FileCacheService};
pub use config::CoreConfig;
pub use event::Event;
pub use history::{EventHistory, EventHistoryDatabase, EventHistoryRequest, HistoryLookup};
pub use loader::{RulesLoadReason, RulesLoadResult, RulesLoader};
pub use rules::{Evaluable, RulesEngine, RulesFailure, RulesResult};
pub use services::{DeviceInforming, LocalDeviceInfo, Networking, ReqwestNetworking};
