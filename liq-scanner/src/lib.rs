//! liq-scanner - Scan reconciliation engine
//!
//! Reconciles field barcode scans against the backend's manifest of
//! expected guides, groups accepted scans by delivery unit (color label),
//! keeps the session ledger in a durable local cache, resyncs the manifest
//! on a timer and reports which guides are still missing.
//!
//! Data flow for one scan:
//! raw text → [`extractor`] → [`manifest`] lookup → accept into
//! [`ledger`] + [`aggregate`] + [`cache`], or reject without mutation.

pub mod aggregate;
pub mod backend;
pub mod cache;
pub mod error;
pub mod extractor;
pub mod ledger;
pub mod manifest;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod submission;
pub mod sync;

pub use crate::backend::{Backend, HttpBackend};
pub use crate::error::{CacheError, FetchError, SchedulerError, SubmitError};
pub use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
pub use crate::session::{MatchOutcome, Session};
pub use crate::sync::{SyncController, SyncMode};
