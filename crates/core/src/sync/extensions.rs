//! Entity-specific conveniences layered over the generic cache.

use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::entities::{
    Category, EntityKind, Goal, GoalPatch, NewCategory, NewGoal, Transaction, MONTHLY_GOAL_NAME,
};
use crate::store::TimeRange;

use super::sync_cache::SyncCache;

/// Half-open UTC window covering one `YYYY-MM` month of `occurred_at`.
fn month_range(month_key: &str) -> Option<TimeRange> {
    let (year, month) = month_key.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    Some(TimeRange {
        column: "occurred_at",
        start,
        end,
    })
}

impl SyncCache<Transaction> {
    /// Month-scoped listing (`YYYY-MM`). Online, the fetched rows are merged
    /// into the mirror by id rather than overwriting it — the mirror keeps
    /// the other months. Offline, the mirror is filtered locally.
    pub async fn list_month(&self, month_key: &str) -> Vec<Transaction> {
        let Some(range) = month_range(month_key) else {
            warn!("transactions: invalid month key '{}'", month_key);
            return Vec::new();
        };
        let filter_mirror = |items: Vec<Transaction>| -> Vec<Transaction> {
            let mut month: Vec<Transaction> = items
                .into_iter()
                .filter(|tx| tx.occurred_at >= range.start && tx.occurred_at < range.end)
                .collect();
            month.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
            month
        };

        let Some(owner) = self.owner().await else {
            return filter_mirror(self.mirror());
        };
        {
            let _guard = self.drain_lock.lock().await;
            self.replay_outbox(&owner).await;
        }
        let rows = match self
            .remote
            .select(EntityKind::Transaction.table(), &owner, Some(&range))
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!("transactions: month fetch failed, serving mirror: {}", err);
                return filter_mirror(self.mirror());
            }
        };
        let fetched: Result<Vec<Transaction>, _> =
            rows.into_iter().map(serde_json::from_value).collect();
        let mut fetched = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!("transactions: month rows malformed, serving mirror: {}", err);
                return filter_mirror(self.mirror());
            }
        };

        let mut items = self.mirror();
        for tx in &fetched {
            match items.iter_mut().find(|existing| existing.id == tx.id) {
                Some(existing) => *existing = tx.clone(),
                None => items.push(tx.clone()),
            }
        }
        items.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        self.write_mirror(&items);

        fetched.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        fetched
    }
}

impl SyncCache<Goal> {
    /// The rolling monthly spending target, if one has been set.
    pub async fn monthly_target(&self) -> Option<Goal> {
        self.list().await.into_iter().find(Goal::is_monthly)
    }

    /// Upsert the monthly spending target.
    pub async fn save_monthly_target(&self, amount: Decimal) -> Goal {
        let existing = self.list().await.into_iter().find(Goal::is_monthly);
        if let Some(goal) = existing {
            let patch = GoalPatch {
                target_amount: Some(amount),
                ..GoalPatch::default()
            };
            if let Some(updated) = self.update(&goal.id, patch).await {
                return updated;
            }
        }
        self.create(NewGoal {
            name: MONTHLY_GOAL_NAME.to_string(),
            target_amount: amount,
            month_key: None,
        })
        .await
    }
}

impl SyncCache<Category> {
    /// Seed starter categories, skipping names the collection already has
    /// (case-insensitive). Returns how many were created.
    pub async fn import_defaults(&self, defaults: &[NewCategory]) -> usize {
        let mut existing: HashSet<String> = self
            .list()
            .await
            .iter()
            .map(|category| category.name.to_lowercase())
            .collect();
        let mut created = 0;
        for draft in defaults {
            let name = draft.name.trim();
            if name.is_empty() || existing.contains(&name.to_lowercase()) {
                continue;
            }
            self.create(draft.clone()).await;
            existing.insert(name.to_lowercase());
            created += 1;
        }
        created
    }
}
