//! Goal entity: a spending target, optionally scoped to one month.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;
use crate::sync::SyncRecord;

/// Reserved goal name for the rolling monthly spending target.
pub const MONTHLY_GOAL_NAME: &str = "monthly";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub target_amount: Decimal,
    /// `YYYY-MM` when the goal applies to a single month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create payload for a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_key: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_key: Option<String>,
}

impl Goal {
    /// Whether this row is the reserved monthly spending target.
    pub fn is_monthly(&self) -> bool {
        self.name.eq_ignore_ascii_case(MONTHLY_GOAL_NAME)
    }
}

impl SyncRecord for Goal {
    type Draft = NewGoal;
    type Patch = GoalPatch;

    fn kind() -> EntityKind {
        EntityKind::Goal
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

    fn from_draft(draft: &NewGoal, id: String, owner_id: String) -> Self {
        Self {
            id,
            user_id: owner_id,
            name: draft.name.clone(),
            target_amount: draft.target_amount,
            month_key: draft.month_key.clone(),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    fn apply_patch(&mut self, patch: &GoalPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(target_amount) = patch.target_amount {
            self.target_amount = target_amount;
        }
        if let Some(month_key) = &patch.month_key {
            self.month_key = Some(month_key.clone());
        }
        self.updated_at = Some(Utc::now());
    }

    fn merge_into_draft(draft: &mut NewGoal, patch: &GoalPatch) {
        if let Some(name) = &patch.name {
            draft.name = name.clone();
        }
        if let Some(target_amount) = patch.target_amount {
            draft.target_amount = target_amount;
        }
        if let Some(month_key) = &patch.month_key {
            draft.month_key = Some(month_key.clone());
        }
    }
}
