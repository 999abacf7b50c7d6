//! Scanning session state and the matching transition
//!
//! A `Session` owns the manifest store, the ledger, the aggregate and the
//! ledger cache. It is created empty or restored from the cache at startup
//! and only reset by an explicit `clear`. `match_scan` is the only path that
//! appends to the ledger; each call updates ledger, dedup set, aggregate and
//! cache before returning.

use crate::aggregate::Aggregate;
use crate::cache::LedgerCache;
use crate::error::SubmitError;
use crate::extractor::{extract, Extraction};
use crate::ledger::{Ledger, ScannedRecord};
use crate::manifest::{ManifestSnapshot, ManifestStore};
use crate::report::{build_missing_report, group_progress, GroupProgress, MissingReport};
use crate::submission::{build_payload, SubmissionMeta, SubmissionPayload};
use chrono::{DateTime, Utc};
use liq_common::events::{EventBus, RejectReason, ScanEvent};
use liq_common::time;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of matching one raw scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Accepted(ScannedRecord),
    RejectedNotFound(String),
    RejectedDuplicate(String),
}

impl MatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MatchOutcome::Accepted(_))
    }
}

pub struct Session {
    manifest: ManifestStore,
    ledger: Ledger,
    aggregate: Aggregate,
    cache: LedgerCache,
    events: EventBus,
}

impl Session {
    /// Empty session that persists to `cache`
    pub fn new(cache: LedgerCache, events: EventBus) -> Self {
        Self {
            manifest: ManifestStore::new(),
            ledger: Ledger::new(),
            aggregate: Aggregate::new(),
            cache,
            events,
        }
    }

    /// Session restored from the cache
    ///
    /// An unreadable cache starts an empty session; the failure is logged
    /// with its kind and the file is left as is until the next save.
    pub fn restore(cache: LedgerCache, events: EventBus) -> Self {
        let records = match cache.load() {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    path = %cache.path().display(),
                    kind = e.kind(),
                    error = %e,
                    "Ledger cache unreadable, starting empty session"
                );
                Vec::new()
            }
        };

        let ledger = Ledger::from_records(records);
        let aggregate = Aggregate::rebuild(ledger.records());
        info!(
            records = ledger.len(),
            buckets = aggregate.buckets().count(),
            "Session restored"
        );

        Self {
            manifest: ManifestStore::new(),
            ledger,
            aggregate,
            cache,
            events,
        }
    }

    /// Swap in a new manifest; the ledger and aggregate are not touched
    pub fn apply_manifest(&mut self, snapshot: ManifestSnapshot) {
        self.manifest.replace(snapshot);
    }

    /// Match one raw scan against the current manifest
    ///
    /// Returns `None` when the raw text holds no digits.
    pub fn match_scan(&mut self, raw: &str) -> Option<MatchOutcome> {
        let extraction = extract(raw);
        if extraction.is_empty() {
            debug!(raw = %raw, "Ignoring scan with no digits");
            return None;
        }
        let code = extraction.guide_code.clone();

        // One snapshot for the whole match
        let manifest = self.manifest.snapshot();
        let Some(group) = manifest.lookup(&code) else {
            warn!(code = %code, "Scan not in manifest");
            self.emit_rejected(&code, RejectReason::NotFound);
            return Some(MatchOutcome::RejectedNotFound(code));
        };

        if self.ledger.contains(&code) {
            warn!(code = %code, "Duplicate scan");
            self.emit_rejected(&code, RejectReason::Duplicate);
            return Some(MatchOutcome::RejectedDuplicate(code));
        }

        let record = ScannedRecord::new(
            self.ledger.next_sequence(),
            code,
            time::clock_12h(&time::now_local()),
            group,
        );
        self.ledger.append(record.clone());
        self.aggregate.record(&record);
        self.persist();

        info!(
            n = record.sequence,
            code = %record.guide_code,
            group = %record.color_label,
            plate = %record.vehicle_plate,
            "Scan accepted"
        );
        self.emit_accepted(&record, &extraction);
        Some(MatchOutcome::Accepted(record))
    }

    /// Explicit user reset
    ///
    /// Empties ledger, dedup set and aggregate and removes the cache file.
    /// A no-op on an empty ledger. Returns the number of records removed.
    pub fn clear(&mut self) -> usize {
        if self.ledger.is_empty() {
            return 0;
        }
        let removed = self.ledger.clear();
        self.aggregate.clear();
        if let Err(e) = self.cache.clear() {
            warn!(kind = e.kind(), error = %e, "Could not remove ledger cache");
        }

        info!(removed, "Session cleared");
        self.events.emit_lossy(ScanEvent::SessionCleared {
            removed,
            timestamp: time::now(),
        });
        removed
    }

    pub fn missing_report(&self) -> MissingReport {
        build_missing_report(&self.manifest.snapshot(), &self.aggregate)
    }

    pub fn group_progress(&self) -> Vec<GroupProgress> {
        group_progress(&self.manifest.snapshot(), &self.aggregate)
    }

    pub fn build_submission(
        &self,
        sent_at: DateTime<Utc>,
    ) -> Result<SubmissionPayload, SubmitError> {
        build_payload(&self.aggregate, SubmissionMeta::cargue(&sent_at))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn manifest(&self) -> Arc<ManifestSnapshot> {
        self.manifest.snapshot()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Best-effort write of the full ledger
    fn persist(&self) {
        if let Err(e) = self.cache.save(self.ledger.records()) {
            warn!(
                kind = e.kind(),
                error = %e,
                "Ledger cache write failed, continuing in memory"
            );
        }
    }

    fn emit_rejected(&self, code: &str, reason: RejectReason) {
        self.events.emit_lossy(ScanEvent::ScanRejected {
            code: code.to_string(),
            reason,
            timestamp: time::now(),
        });
    }

    fn emit_accepted(&self, record: &ScannedRecord, extraction: &Extraction) {
        self.events.emit_lossy(ScanEvent::ScanAccepted {
            sequence: record.sequence,
            code: record.guide_code.clone(),
            original: extraction.original_text.clone(),
            source_digits: extraction.source_digit_length,
            hora: record.timestamp.clone(),
            vehicle_plate: record.vehicle_plate.clone(),
            city: record.city.clone(),
            color: record.color.clone(),
            color_label: record.color_label.clone(),
            timestamp: time::now(),
        });
    }
}
