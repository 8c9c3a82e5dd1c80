//! Transaction entity: a dated money movement tied to a category and a bank.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{EntityKind, FlowKind};
use crate::sync::SyncRecord;

/// A money movement as stored remotely and mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub description: String,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create payload for a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FlowKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
}

impl SyncRecord for Transaction {
    type Draft = NewTransaction;
    type Patch = TransactionPatch;

    fn kind() -> EntityKind {
        EntityKind::Transaction
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn from_draft(draft: &NewTransaction, id: String, owner_id: String) -> Self {
        Self {
            id,
            user_id: owner_id,
            description: draft.description.clone(),
            amount: draft.amount,
            occurred_at: draft.occurred_at,
            kind: draft.kind,
            category_id: draft.category_id.clone(),
            bank_id: draft.bank_id.clone(),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    fn apply_patch(&mut self, patch: &TransactionPatch) {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(occurred_at) = patch.occurred_at {
            self.occurred_at = occurred_at;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(category_id) = &patch.category_id {
            self.category_id = Some(category_id.clone());
        }
        if let Some(bank_id) = &patch.bank_id {
            self.bank_id = Some(bank_id.clone());
        }
        self.updated_at = Some(Utc::now());
    }

    fn merge_into_draft(draft: &mut NewTransaction, patch: &TransactionPatch) {
        if let Some(description) = &patch.description {
            draft.description = description.clone();
        }
        if let Some(amount) = patch.amount {
            draft.amount = amount;
        }
        if let Some(occurred_at) = patch.occurred_at {
            draft.occurred_at = occurred_at;
        }
        if let Some(kind) = patch.kind {
            draft.kind = kind;
        }
        if let Some(category_id) = &patch.category_id {
            draft.category_id = Some(category_id.clone());
        }
        if let Some(bank_id) = &patch.bank_id {
            draft.bank_id = Some(bank_id.clone());
        }
    }

    // Transactions are ordered by when the money moved, not when the row was
    // written.
    fn sort_timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.occurred_at)
    }
}
