//! Per-entity adapter contract used by the generic sync cache.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entities::{EntityKind, LOCAL_OWNER};

/// Entity adapter contract: table identity, field access, and the handful of
/// operations the generic cache cannot express without knowing the concrete
/// record shape.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Create payload accepted by `SyncCache::create`.
    type Draft: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Partial field set accepted by `SyncCache::update`.
    type Patch: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn kind() -> EntityKind;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Materialize an optimistic record from a draft. `owner_id` is
    /// [`LOCAL_OWNER`] when the remote store did not confirm the create.
    fn from_draft(draft: &Self::Draft, id: String, owner_id: String) -> Self;

    /// Apply a partial update to a mirror record.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Fold a partial update into a draft still waiting in the outbox, so
    /// the eventual remote insert carries the merged fields.
    fn merge_into_draft(draft: &mut Self::Draft, patch: &Self::Patch);

    /// Timestamp the mirror is ordered by, newest first.
    fn sort_timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }

    /// Whether this record was created locally and not yet confirmed
    /// remotely.
    fn is_local(&self) -> bool {
        self.owner_id() == LOCAL_OWNER
    }
}
