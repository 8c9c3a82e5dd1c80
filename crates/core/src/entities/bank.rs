//! Bank entity: an account source transactions are attributed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;
use crate::sync::SyncRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create payload for a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBank {
    pub name: String,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SyncRecord for Bank {
    type Draft = NewBank;
    type Patch = BankPatch;

    fn kind() -> EntityKind {
        EntityKind::Bank
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

    fn from_draft(draft: &NewBank, id: String, owner_id: String) -> Self {
        Self {
            id,
            user_id: owner_id,
            name: draft.name.clone(),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    fn apply_patch(&mut self, patch: &BankPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        self.updated_at = Some(Utc::now());
    }

    fn merge_into_draft(draft: &mut NewBank, patch: &BankPatch) {
        if let Some(name) = &patch.name {
            draft.name = name.clone();
        }
    }
}
