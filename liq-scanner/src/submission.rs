//! Submission payload construction
//!
//! Packages every non-empty aggregate bucket for the backend. Building the
//! payload is pure, so a retried submit produces the same groups again; the
//! backend itself is not guaranteed to be idempotent.

use crate::aggregate::{Aggregate, AggregateEntry};
use crate::error::SubmitError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Submission kind; this tool only ever records loading
pub const SUBMISSION_KIND: &str = "CARGUE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionMeta {
    #[serde(rename = "tipo")]
    pub kind: String,
    /// ISO-8601 send time
    #[serde(rename = "timestamp_envio")]
    pub sent_at: String,
}

impl SubmissionMeta {
    pub fn cargue(sent_at: &DateTime<Utc>) -> Self {
        Self {
            kind: SUBMISSION_KIND.to_string(),
            sent_at: liq_common::time::iso_timestamp(sent_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadGroup {
    #[serde(rename = "placa")]
    pub vehicle_plate: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    pub color: String,
    #[serde(rename = "datos")]
    pub entries: Vec<AggregateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    pub meta: SubmissionMeta,
    #[serde(rename = "grupos")]
    pub groups: Vec<PayloadGroup>,
}

/// Backend acknowledgement; display only
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default = "default_sheet", deserialize_with = "lenient_sheet")]
    pub sheet: String,
    #[serde(default, deserialize_with = "lenient_blocks")]
    pub blocks: u64,
}

impl Default for SubmissionReceipt {
    fn default() -> Self {
        Self {
            sheet: default_sheet(),
            blocks: 0,
        }
    }
}

/// Build the payload from every bucket with at least one entry
pub fn build_payload(
    aggregate: &Aggregate,
    meta: SubmissionMeta,
) -> Result<SubmissionPayload, SubmitError> {
    let groups: Vec<PayloadGroup> = aggregate
        .buckets()
        .filter(|bucket| !bucket.entries.is_empty())
        .map(|bucket| PayloadGroup {
            vehicle_plate: bucket.vehicle_plate.clone(),
            city: bucket.city.clone(),
            color: bucket.color.clone(),
            entries: bucket.entries.clone(),
        })
        .collect();

    if groups.is_empty() {
        return Err(SubmitError::Empty);
    }
    Ok(SubmissionPayload { meta, groups })
}

fn default_sheet() -> String {
    "-".to_string()
}

fn lenient_sheet<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => default_sheet(),
    })
}

fn lenient_blocks<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ScannedRecord;
    use chrono::TimeZone;

    fn scanned(n: usize, code: &str, label: &str, plate: &str) -> ScannedRecord {
        ScannedRecord {
            sequence: n,
            guide_code: code.to_string(),
            timestamp: format!("2:00:0{} PM", n),
            vehicle_plate: plate.to_string(),
            city: "BOGOTA".to_string(),
            color: "#abc".to_string(),
            color_label: label.to_string(),
        }
    }

    fn meta() -> SubmissionMeta {
        SubmissionMeta::cargue(&Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 0).unwrap())
    }

    #[test]
    fn test_empty_aggregate_is_error() {
        assert!(matches!(
            build_payload(&Aggregate::new(), meta()),
            Err(SubmitError::Empty)
        ));
    }

    #[test]
    fn test_one_group_per_bucket_in_first_seen_order() {
        let aggregate = Aggregate::rebuild(&[
            scanned(1, "111", "AZUL", "BBB"),
            scanned(2, "222", "ROJO", "AAA"),
            scanned(3, "333", "AZUL", "BBB"),
        ]);
        let payload = build_payload(&aggregate, meta()).unwrap();

        assert_eq!(payload.groups.len(), 2);
        assert_eq!(payload.groups[0].vehicle_plate, "BBB");
        assert_eq!(payload.groups[0].entries.len(), 2);
        assert_eq!(payload.groups[1].entries[0].guide_code, "222");
    }

    #[test]
    fn test_payload_wire_format() {
        let aggregate = Aggregate::rebuild(&[scanned(1, "12345678901", "ROJO", "AAA")]);
        let json = serde_json::to_value(build_payload(&aggregate, meta()).unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "meta": { "tipo": "CARGUE", "timestamp_envio": "2024-03-09T17:45:00.000Z" },
                "grupos": [{
                    "placa": "AAA",
                    "ciudad": "BOGOTA",
                    "color": "#abc",
                    "datos": [{ "codigo": "12345678901", "hora": "2:00:01 PM" }]
                }]
            })
        );
    }

    #[test]
    fn test_receipt_parsing_is_lenient() {
        let full: SubmissionReceipt =
            serde_json::from_str(r#"{"sheet":"CARGUE_2024","blocks":3}"#).unwrap();
        assert_eq!(full.sheet, "CARGUE_2024");
        assert_eq!(full.blocks, 3);

        let partial: SubmissionReceipt = serde_json::from_str(r#"{"blocks":"2"}"#).unwrap();
        assert_eq!(partial, SubmissionReceipt { sheet: "-".to_string(), blocks: 2 });

        let empty: SubmissionReceipt = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SubmissionReceipt::default());
    }
}
