//! Session ledger: the ordered record of accepted scans
//!
//! The ledger is the source of truth for a session. It is appended to by
//! matching, cleared by an explicit reset and never trimmed otherwise. A
//! guide code appears at most once.

use crate::manifest::GuideIndexEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// One accepted scan with the group attributes captured at scan time
///
/// The group fields are copies, not references into the manifest, so a
/// later resync cannot move a record to another bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedRecord {
    /// 1-based display order
    #[serde(rename = "n")]
    pub sequence: usize,

    #[serde(rename = "codigo")]
    pub guide_code: String,

    /// Local wall-clock time on a 12-hour clock
    #[serde(rename = "hora", default)]
    pub timestamp: String,

    #[serde(rename = "placa", default)]
    pub vehicle_plate: String,

    #[serde(rename = "ciudad", default)]
    pub city: String,

    #[serde(default)]
    pub color: String,

    #[serde(rename = "colorName", default)]
    pub color_label: String,
}

impl ScannedRecord {
    pub fn new(
        sequence: usize,
        guide_code: impl Into<String>,
        timestamp: impl Into<String>,
        group: &GuideIndexEntry,
    ) -> Self {
        Self {
            sequence,
            guide_code: guide_code.into(),
            timestamp: timestamp.into(),
            vehicle_plate: group.vehicle_plate.clone(),
            city: group.city.clone(),
            color: group.color.clone(),
            color_label: group.color_label.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<ScannedRecord>,
    seen: HashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger (and its dedup set) from persisted records
    ///
    /// A repeated code keeps its first occurrence only. Records are
    /// renumbered 1..=len in stored order so `next_sequence` never reuses a
    /// number.
    pub fn from_records(records: Vec<ScannedRecord>) -> Self {
        let mut ledger = Self::new();
        for mut record in records {
            if ledger.contains(&record.guide_code) {
                warn!(code = %record.guide_code, "Dropping repeated code from restored ledger");
                continue;
            }
            record.sequence = ledger.next_sequence();
            ledger.seen.insert(record.guide_code.clone());
            ledger.records.push(record);
        }
        ledger
    }

    pub fn contains(&self, guide_code: &str) -> bool {
        self.seen.contains(guide_code)
    }

    /// Sequence number the next accepted record gets
    pub fn next_sequence(&self) -> usize {
        self.records.len() + 1
    }

    /// Append a record whose code is not yet present
    ///
    /// Returns false (and leaves the ledger unchanged) for a duplicate.
    pub(crate) fn append(&mut self, record: ScannedRecord) -> bool {
        if !self.seen.insert(record.guide_code.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[ScannedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record; returns how many were removed
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.seen.clear();
        removed
    }
}
