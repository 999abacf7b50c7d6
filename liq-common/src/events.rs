//! Event system for the liquidation scanner
//!
//! Provides the shared event definitions and an EventBus used by the
//! scanning session to publish outcomes to whatever front end is attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a scan was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Code does not appear in the current manifest
    NotFound,
    /// Code was already accepted in this session
    Duplicate,
}

/// Scanner event types
///
/// Events are broadcast via EventBus and can be serialized for display or
/// log shipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan matched the manifest and was appended to the ledger
    ScanAccepted {
        /// 1-based display order within the session
        sequence: usize,
        /// Canonical guide code
        code: String,
        /// Raw scanner text the code was extracted from
        original: String,
        /// Number of digits in the raw text
        source_digits: usize,
        /// Wall-clock time stamped on the record
        hora: String,
        vehicle_plate: String,
        city: String,
        color: String,
        color_label: String,
        timestamp: DateTime<Utc>,
    },

    /// A scan was rejected without touching session state
    ScanRejected {
        code: String,
        reason: RejectReason,
        timestamp: DateTime<Utc>,
    },

    /// The manifest was replaced by a fresh copy from the backend
    ManifestSynced {
        groups: usize,
        guides: usize,
        /// True for scheduled background resyncs
        silent: bool,
        timestamp: DateTime<Utc>,
    },

    /// A manifest load failed; the previous manifest stays in place
    SyncFailed {
        error: String,
        silent: bool,
        timestamp: DateTime<Utc>,
    },

    /// The session ledger was explicitly reset
    SessionCleared {
        /// Number of records discarded
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// The backend accepted a submission
    SubmissionSent {
        groups: usize,
        sheet: String,
        blocks: u64,
        timestamp: DateTime<Utc>,
    },

    /// A submission could not be built or delivered
    SubmissionFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use liq_common::events::{EventBus, ScanEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ScanEvent::SessionCleared {
///     removed: 3,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(ScanEvent::SessionCleared { removed: 3, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ScanEvent) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
