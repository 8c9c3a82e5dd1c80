//! Domain entities served by the sync caches.

mod bank;
mod category;
mod goal;
mod transaction;

pub use bank::{Bank, BankPatch, NewBank};
pub use category::{Category, CategoryPatch, NewCategory, DEFAULT_CATEGORY_COLOR};
pub use goal::{Goal, GoalPatch, NewGoal, MONTHLY_GOAL_NAME};
pub use transaction::{NewTransaction, Transaction, TransactionPatch};

use serde::{Deserialize, Serialize};

/// Owner tag applied to records created while the remote store was
/// unavailable. Replaced by the real owner id once the queued create is
/// confirmed and the mirror is reconciled.
pub const LOCAL_OWNER: &str = "local";

/// Direction of a money flow; shared by transactions and categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Income,
    Expense,
}

/// Canonical list of entity collections that participate in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transaction,
    Category,
    Bank,
    Goal,
}

impl EntityKind {
    /// Every synced collection, in the order whole-app passes visit them.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Transaction,
        EntityKind::Category,
        EntityKind::Bank,
        EntityKind::Goal,
    ];

    /// Remote table name for this entity kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Transaction => "transactions",
            EntityKind::Category => "categories",
            EntityKind::Bank => "banks",
            EntityKind::Goal => "goals",
        }
    }

    /// Reverse lookup from a remote table name.
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }

    /// Durable slot holding the last-known-good snapshot of this collection.
    pub fn mirror_slot(self) -> &'static str {
        match self {
            EntityKind::Transaction => "transactions.mirror",
            EntityKind::Category => "categories.mirror",
            EntityKind::Bank => "banks.mirror",
            EntityKind::Goal => "goals.mirror",
        }
    }

    /// Durable slot holding this collection's pending-mutation queue.
    pub fn outbox_slot(self) -> &'static str {
        match self {
            EntityKind::Transaction => "transactions.outbox",
            EntityKind::Category => "categories.outbox",
            EntityKind::Bank => "banks.outbox",
            EntityKind::Goal => "goals.outbox",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_serialization_matches_table_contract() {
        let actual = EntityKind::ALL
            .iter()
            .map(|kind| serde_json::to_string(kind).expect("serialize entity kind"))
            .collect::<Vec<_>>();
        let expected = vec!["\"transaction\"", "\"category\"", "\"bank\"", "\"goal\""];
        assert_eq!(actual, expected);
    }

    #[test]
    fn table_lookup_round_trips() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_table(kind.table()), Some(kind));
        }
        assert_eq!(EntityKind::from_table("profiles"), None);
    }

    #[test]
    fn slots_are_distinct_per_kind() {
        let mut slots: Vec<&str> = EntityKind::ALL
            .iter()
            .flat_map(|kind| [kind.mirror_slot(), kind.outbox_slot()])
            .collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), 8);
    }
}
