//! Abstract remote row store the sync caches reconcile against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::Result;

/// Half-open time window filter (`start <= column < end`) for scoped selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub column: &'static str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The hosted database, reduced to what the sync core needs.
///
/// Every read and write is scoped to the resolved owner; implementations
/// reject calls that fail on the wire, and the caches translate those
/// rejections into local-only fallbacks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Resolve the authenticated user id scoping all remote access.
    /// `None` means unauthenticated; callers must behave as if the remote
    /// store were disabled.
    async fn current_owner_id(&self) -> Result<Option<String>>;

    /// Fetch the owner's rows for `table`, optionally bounded by `range`.
    async fn select(
        &self,
        table: &str,
        owner_id: &str,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Value>>;

    /// Insert a row; the store assigns the canonical id and returns the row.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch the identified row and return its canonical state.
    async fn update(&self, table: &str, id: &str, owner_id: &str, changes: Value)
        -> Result<Value>;

    /// Delete the identified row.
    async fn delete(&self, table: &str, id: &str, owner_id: &str) -> Result<()>;
}
