//! Category entity: a named, colored bucket transactions are grouped under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{EntityKind, FlowKind};
use crate::sync::SyncRecord;

/// Fallback color applied when a category is created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#6200ee";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create payload for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: FlowKind,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FlowKind>,
}

impl Category {
    /// Starter palette offered to fresh profiles.
    pub fn default_set() -> Vec<NewCategory> {
        [
            ("Alimentação", "#FFADAD"),
            ("Transporte", "#A0C4FF"),
            ("Moradia", "#FDFFB6"),
            ("Lazer", "#BDB2FF"),
            ("Saúde", "#CAFFBF"),
            ("Educação", "#FFD6A5"),
            ("Roupas", "#9ad5ca"),
            ("Outros", "#c7c7e2"),
        ]
        .into_iter()
        .map(|(name, color)| NewCategory {
            name: name.to_string(),
            color: color.to_string(),
            kind: FlowKind::Expense,
        })
        .collect()
    }
}

impl SyncRecord for Category {
    type Draft = NewCategory;
    type Patch = CategoryPatch;

    fn kind() -> EntityKind {
        EntityKind::Category
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

    fn from_draft(draft: &NewCategory, id: String, owner_id: String) -> Self {
        Self {
            id,
            user_id: owner_id,
            name: draft.name.clone(),
            color: draft.color.clone(),
            kind: draft.kind,
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    fn apply_patch(&mut self, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        self.updated_at = Some(Utc::now());
    }

    fn merge_into_draft(draft: &mut NewCategory, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            draft.name = name.clone();
        }
        if let Some(color) = &patch.color {
            draft.color = color.clone();
        }
        if let Some(kind) = patch.kind {
            draft.kind = kind;
        }
    }
}
