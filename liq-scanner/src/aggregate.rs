//! Grouping of ledger entries by color label
//!
//! Buckets are keyed by the color label captured on each record, not by the
//! group key, so a resync that renumbers groups but keeps the label still
//! accumulates into the same bucket. Buckets keep first-seen order, which is
//! also the order groups are submitted in.

use crate::ledger::ScannedRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One scanned guide inside a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEntry {
    #[serde(rename = "codigo")]
    pub guide_code: String,
    #[serde(rename = "hora")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAggregate {
    pub color_label: String,
    pub vehicle_plate: String,
    pub city: String,
    pub color: String,
    pub entries: Vec<AggregateEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    buckets: Vec<GroupAggregate>,
    by_label: HashMap<String, usize>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rebuild from ledger records
    pub fn rebuild(records: &[ScannedRecord]) -> Self {
        let mut aggregate = Self::new();
        for record in records {
            aggregate.record(record);
        }
        aggregate
    }

    /// Incremental update for one accepted record
    ///
    /// A new bucket takes its vehicle, city and color from the first record
    /// that lands in it.
    pub fn record(&mut self, record: &ScannedRecord) {
        let slot = match self.by_label.get(&record.color_label) {
            Some(&slot) => slot,
            None => {
                self.buckets.push(GroupAggregate {
                    color_label: record.color_label.clone(),
                    vehicle_plate: record.vehicle_plate.clone(),
                    city: record.city.clone(),
                    color: record.color.clone(),
                    entries: Vec::new(),
                });
                let slot = self.buckets.len() - 1;
                self.by_label.insert(record.color_label.clone(), slot);
                slot
            }
        };
        self.buckets[slot].entries.push(AggregateEntry {
            guide_code: record.guide_code.clone(),
            timestamp: record.timestamp.clone(),
        });
    }

    pub fn bucket(&self, color_label: &str) -> Option<&GroupAggregate> {
        self.by_label.get(color_label).map(|&slot| &self.buckets[slot])
    }

    /// Buckets in first-seen order
    pub fn buckets(&self) -> impl Iterator<Item = &GroupAggregate> {
        self.buckets.iter()
    }

    pub fn scanned_count(&self, color_label: &str) -> usize {
        self.bucket(color_label).map_or(0, |b| b.entries.len())
    }

    pub fn total_entries(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
        self.by_label.clear();
    }
}
