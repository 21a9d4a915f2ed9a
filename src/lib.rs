// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod archive;
pub mod category;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod types;

// Matching core: timestamps, canonical forms, exact and near-duplicate checks
pub mod canon;
pub mod dedup;
pub mod embedding;
pub mod entity;
pub mod similarity;
pub mod timestamp;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::SentinelConfig;
pub use crate::monitor::{CycleReport, Monitor};
pub use crate::notify::{Alert, Notifier, NotifierMux};
pub use crate::pipeline::{Outcome, Pipeline};
pub use crate::types::HeadlineRecord;
