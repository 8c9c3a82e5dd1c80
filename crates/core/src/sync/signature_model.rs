//! Remote collection signatures used for staleness detection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::EntityKind;

/// Slot holding the last-observed remote signature.
pub const SIGNATURE_SLOT: &str = "app.last_remote_signature";

/// Slot stamped (epoch milliseconds) after every successful full refresh.
pub const LAST_REFRESH_SLOT: &str = "app.last_refresh_at";

/// Cheap proxy for "has this collection changed": row count plus the newest
/// `updated_at`/`created_at` in epoch milliseconds. Used only to skip
/// redundant refetches, never for correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySignature {
    pub count: u64,
    pub latest_ts: i64,
}

/// Per-entity signatures, persisted across sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSignature {
    pub transactions: EntitySignature,
    pub categories: EntitySignature,
    pub banks: EntitySignature,
    pub goals: EntitySignature,
}

impl RemoteSignature {
    pub fn get(&self, kind: EntityKind) -> EntitySignature {
        match kind {
            EntityKind::Transaction => self.transactions,
            EntityKind::Category => self.categories,
            EntityKind::Bank => self.banks,
            EntityKind::Goal => self.goals,
        }
    }

    pub fn set(&mut self, kind: EntityKind, signature: EntitySignature) {
        match kind {
            EntityKind::Transaction => self.transactions = signature,
            EntityKind::Category => self.categories = signature,
            EntityKind::Bank => self.banks = signature,
            EntityKind::Goal => self.goals = signature,
        }
    }

    /// Any count or latest-timestamp mismatch marks the caches stale.
    pub fn differs(&self, other: &RemoteSignature) -> bool {
        self != other
    }
}

/// Signature of a raw remote row set. Rows without a parseable
/// `updated_at`/`created_at` contribute only to the count.
pub fn signature_of_rows(rows: &[Value]) -> EntitySignature {
    let latest_ts = rows
        .iter()
        .filter_map(row_timestamp_millis)
        .max()
        .unwrap_or(0);
    EntitySignature {
        count: rows.len() as u64,
        latest_ts,
    }
}

fn row_timestamp_millis(row: &Value) -> Option<i64> {
    let raw = row
        .get("updated_at")
        .and_then(Value::as_str)
        .or_else(|| row.get("created_at").and_then(Value::as_str))?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_signature_prefers_updated_at() {
        let rows = vec![
            json!({ "id": "a", "created_at": "2026-01-01T00:00:00Z" }),
            json!({
                "id": "b",
                "created_at": "2026-01-02T00:00:00Z",
                "updated_at": "2026-01-05T00:00:00Z"
            }),
        ];
        let signature = signature_of_rows(&rows);
        assert_eq!(signature.count, 2);
        assert_eq!(
            signature.latest_ts,
            chrono::DateTime::parse_from_rfc3339("2026-01-05T00:00:00Z")
                .expect("timestamp")
                .timestamp_millis()
        );
    }

    #[test]
    fn unparseable_timestamps_only_count() {
        let rows = vec![json!({ "id": "a", "created_at": "not-a-date" })];
        let signature = signature_of_rows(&rows);
        assert_eq!(signature.count, 1);
        assert_eq!(signature.latest_ts, 0);
    }

    #[test]
    fn differs_on_any_entity_mismatch() {
        let base = RemoteSignature::default();
        assert!(!base.differs(&RemoteSignature::default()));

        let mut changed = base;
        changed.set(
            EntityKind::Bank,
            EntitySignature {
                count: 1,
                latest_ts: 0,
            },
        );
        assert!(base.differs(&changed));
    }
}
