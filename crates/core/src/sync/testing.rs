//! Test doubles shared by the sync test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::store::{RemoteStore, TimeRange};

/// In-memory remote store with scriptable failure and per-operation call
/// counters.
#[derive(Default)]
pub(crate) struct MockRemote {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    owner: Mutex<Option<String>>,
    failing: AtomicBool,
    next_id: AtomicUsize,
    pub select_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MockRemote {
    pub fn online(owner: &str) -> Self {
        let remote = Self::default();
        remote.set_owner(Some(owner));
        remote
    }

    /// Script every data-plane call to fail (owner resolution keeps
    /// working, as an authenticated session does while the network flaps).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_owner(&self, owner: Option<&str>) {
        *self.owner.lock().expect("owner lock") = owner.map(str::to_string);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .expect("tables lock")
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Push a row directly, as another device would have.
    pub fn seed_row(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .expect("tables lock")
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    fn guard(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::remote("scripted network failure"));
        }
        Ok(())
    }

    fn parse_ts(row: &Value, column: &str) -> Option<DateTime<Utc>> {
        row.get(column)
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn current_owner_id(&self) -> Result<Option<String>> {
        Ok(self.owner.lock().expect("owner lock").clone())
    }

    async fn select(
        &self,
        table: &str,
        owner_id: &str,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Value>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        let rows = self.rows(table);
        Ok(rows
            .into_iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(owner_id))
            .filter(|row| match range {
                None => true,
                Some(range) => Self::parse_ts(row, range.column)
                    .map(|ts| ts >= range.start && ts < range.end)
                    .unwrap_or(false),
            })
            .collect())
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stamp = Utc::now().to_rfc3339();
        let map = row.as_object_mut().expect("row object");
        map.insert("id".to_string(), Value::String(id));
        map.insert("created_at".to_string(), Value::String(stamp.clone()));
        map.insert("updated_at".to_string(), Value::String(stamp));
        self.tables
            .lock()
            .expect("tables lock")
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        owner_id: &str,
        changes: Value,
    ) -> Result<Value> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        let mut tables = self.tables.lock().expect("tables lock");
        let rows = tables.entry(table.to_string()).or_default();
        let row = rows
            .iter_mut()
            .find(|row| {
                row.get("id").and_then(Value::as_str) == Some(id)
                    && row.get("user_id").and_then(Value::as_str) == Some(owner_id)
            })
            .ok_or_else(|| Error::remote(format!("no row '{}' in '{}'", id, table)))?;
        let target = row.as_object_mut().expect("row object");
        if let Some(fields) = changes.as_object() {
            for (column, value) in fields {
                target.insert(column.clone(), value.clone());
            }
        }
        target.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str, owner_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        let mut tables = self.tables.lock().expect("tables lock");
        let rows = tables.entry(table.to_string()).or_default();
        rows.retain(|row| {
            row.get("id").and_then(Value::as_str) != Some(id)
                || row.get("user_id").and_then(Value::as_str) != Some(owner_id)
        });
        Ok(())
    }
}
