//! # Liquidation Scanner Common Library
//!
//! Shared code for the liquidation scanner crates including:
//! - Error types
//! - Bootstrap configuration loading
//! - Event types (ScanEvent enum) and the EventBus
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
