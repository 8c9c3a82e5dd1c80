//! Outbox queue model: durable pending mutations awaiting remote
//! confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation kinds carried by outbox entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxOperation {
    Create,
    Update,
    Delete,
}

/// A pending mutation that could not be confirmed by the remote store.
///
/// Entries are appended at the back of the slot's JSON array and replayed
/// front-first, strictly in enqueue order per entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OutboxEntry<D, P> {
    Create {
        entity_id: String,
        draft: D,
        enqueued_at: DateTime<Utc>,
    },
    Update {
        entity_id: String,
        patch: P,
        enqueued_at: DateTime<Utc>,
    },
    Delete {
        entity_id: String,
        enqueued_at: DateTime<Utc>,
    },
}

impl<D, P> OutboxEntry<D, P> {
    pub fn entity_id(&self) -> &str {
        match self {
            OutboxEntry::Create { entity_id, .. }
            | OutboxEntry::Update { entity_id, .. }
            | OutboxEntry::Delete { entity_id, .. } => entity_id,
        }
    }

    pub fn operation(&self) -> OutboxOperation {
        match self {
            OutboxEntry::Create { .. } => OutboxOperation::Create,
            OutboxEntry::Update { .. } => OutboxOperation::Update,
            OutboxEntry::Delete { .. } => OutboxOperation::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NewBank;

    #[test]
    fn entries_serialize_with_op_tag() {
        let entry: OutboxEntry<NewBank, serde_json::Value> = OutboxEntry::Create {
            entity_id: "b-1".to_string(),
            draft: NewBank {
                name: "Nubank".to_string(),
            },
            enqueued_at: "2026-02-01T08:00:00Z".parse().expect("timestamp"),
        };
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["op"], "create");
        assert_eq!(value["entity_id"], "b-1");
        assert_eq!(value["draft"]["name"], "Nubank");
    }
}
