//! Missing-guide report and per-group progress
//!
//! Both read a manifest snapshot and the aggregate and never mutate either.
//! Aggregate membership is fixed at scan time while manifest groups are
//! live, so after a resync the liquidated count can differ from what a fresh
//! re-match would give. That approximation is kept on purpose; old records
//! are never re-matched against new groups.

use crate::aggregate::Aggregate;
use crate::manifest::{Group, ManifestSnapshot};
use serde::Serialize;
use std::collections::HashSet;

/// Unmatched guides of one manifest group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group_key: String,
    pub vehicle_plate: String,
    pub city: String,
    pub color: String,
    pub color_label: String,
    /// Guides the manifest expects for this group
    pub total: usize,
    /// `total - not_found.len()`
    pub liquidated: usize,
    /// Manifest guides with no scan in the matching bucket, manifest order
    pub not_found: Vec<String>,
}

impl GroupReport {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingReport {
    pub groups: Vec<GroupReport>,
}

impl MissingReport {
    pub fn total_missing(&self) -> usize {
        self.groups.iter().map(|g| g.not_found.len()).sum()
    }
}

/// Scanned/expected counts for one manifest group card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupProgress {
    pub group_key: String,
    pub vehicle_plate: String,
    pub city: String,
    pub color: String,
    pub color_label: String,
    /// Bucket size clamped to `total`
    pub scanned: usize,
    pub total: usize,
}

/// Compute unmatched guides for every current manifest group
pub fn build_missing_report(manifest: &ManifestSnapshot, aggregate: &Aggregate) -> MissingReport {
    let groups = manifest
        .groups()
        .iter()
        .map(|group| {
            let scanned: HashSet<&str> = aggregate
                .bucket(&group.color_label)
                .map(|b| b.entries.iter().map(|e| e.guide_code.as_str()).collect())
                .unwrap_or_default();

            let not_found: Vec<String> = group
                .guide_codes
                .iter()
                .filter(|code| !scanned.contains(code.trim()))
                .cloned()
                .collect();
            let total = group.guide_codes.len();

            GroupReport {
                liquidated: total - not_found.len(),
                total,
                not_found,
                ..report_header(group)
            }
        })
        .collect();

    MissingReport { groups }
}

/// Progress card per manifest group, in manifest order
pub fn group_progress(manifest: &ManifestSnapshot, aggregate: &Aggregate) -> Vec<GroupProgress> {
    manifest
        .groups()
        .iter()
        .map(|group| {
            let total = group.guide_codes.len();
            GroupProgress {
                group_key: group.group_key.clone(),
                vehicle_plate: group.vehicle_plate.clone(),
                city: group.city.clone(),
                color: group.color.clone(),
                color_label: group.color_label.clone(),
                scanned: aggregate.scanned_count(&group.color_label).min(total),
                total,
            }
        })
        .collect()
}

fn report_header(group: &Group) -> GroupReport {
    GroupReport {
        group_key: group.group_key.clone(),
        vehicle_plate: group.vehicle_plate.clone(),
        city: group.city.clone(),
        color: group.color.clone(),
        color_label: group.color_label.clone(),
        total: 0,
        liquidated: 0,
        not_found: Vec::new(),
    }
}
