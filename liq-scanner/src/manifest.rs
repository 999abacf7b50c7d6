//! Manifest store: authoritative groups and the guide code index
//!
//! A manifest is never mutated in place. Each load builds a complete new
//! `ManifestSnapshot` (groups plus reverse index) and the store swaps it in
//! with a single assignment, so a match always sees one whole manifest.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A logical delivery unit (vehicle + city + color label)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Stable key of the manifest entry
    #[serde(rename = "col", default, deserialize_with = "lenient_string")]
    pub group_key: String,

    #[serde(rename = "placa", default, deserialize_with = "lenient_string")]
    pub vehicle_plate: String,

    #[serde(rename = "ciudad", default, deserialize_with = "lenient_string")]
    pub city: String,

    /// Display color (CSS color string)
    #[serde(default, deserialize_with = "lenient_string")]
    pub color: String,

    /// Human label of the color; the aggregation key
    #[serde(rename = "colorName", default, deserialize_with = "lenient_string")]
    pub color_label: String,

    /// Expected guide codes, in manifest order
    #[serde(rename = "guias", default, deserialize_with = "lenient_codes")]
    pub guide_codes: Vec<String>,
}

/// Group attributes for one guide code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideIndexEntry {
    pub group_key: String,
    pub vehicle_plate: String,
    pub city: String,
    pub color: String,
    pub color_label: String,
}

impl From<&Group> for GuideIndexEntry {
    fn from(group: &Group) -> Self {
        Self {
            group_key: group.group_key.clone(),
            vehicle_plate: group.vehicle_plate.clone(),
            city: group.city.clone(),
            color: group.color.clone(),
            color_label: group.color_label.clone(),
        }
    }
}

/// One complete, immutable manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestSnapshot {
    groups: Vec<Group>,
    index: HashMap<String, GuideIndexEntry>,
    synced_at: Option<DateTime<Local>>,
}

impl ManifestSnapshot {
    /// Build a snapshot and its full guide index
    ///
    /// Every non-empty code of every group is indexed. When a code is listed
    /// by more than one group the later group wins.
    pub fn from_groups(groups: Vec<Group>, synced_at: Option<DateTime<Local>>) -> Self {
        let mut index = HashMap::new();
        for group in &groups {
            for code in &group.guide_codes {
                let code = code.trim();
                if code.is_empty() {
                    continue;
                }
                index.insert(code.to_string(), GuideIndexEntry::from(group));
            }
        }
        Self {
            groups,
            index,
            synced_at,
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn lookup(&self, guide_code: &str) -> Option<&GuideIndexEntry> {
        self.index.get(guide_code)
    }

    /// Number of distinct indexed guide codes
    pub fn guide_count(&self) -> usize {
        self.index.len()
    }

    pub fn synced_at(&self) -> Option<DateTime<Local>> {
        self.synced_at
    }
}

/// Holder of the current manifest
///
/// Starts empty (no codes match) until the first successful load.
#[derive(Debug, Clone, Default)]
pub struct ManifestStore {
    current: Arc<ManifestSnapshot>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current manifest; cheap to clone and unaffected by later swaps
    pub fn snapshot(&self) -> Arc<ManifestSnapshot> {
        Arc::clone(&self.current)
    }

    /// Replace the whole manifest
    pub fn replace(&mut self, snapshot: ManifestSnapshot) {
        self.current = Arc::new(snapshot);
    }

    /// True once any manifest has been loaded
    pub fn is_loaded(&self) -> bool {
        self.current.synced_at.is_some()
    }
}

/// Accept a JSON string, number, bool or null as a trimmed string
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_string).unwrap_or_default())
}

/// Accept a list of strings/numbers; null entries and blanks are dropped
fn lenient_codes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(value_to_string)
        .filter(|code| !code.is_empty())
        .collect())
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
