//! Generic offline-first cache: remote-first mutations, outbox fallback, and
//! mirror reconciliation. One instance per entity kind.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::{EntityKind, LOCAL_OWNER};
use crate::errors::{Error, Result};
use crate::store::{LocalSlotStore, RemoteStore};

use super::outbox_model::OutboxEntry;
use super::record::SyncRecord;
use super::signature_model::{signature_of_rows, EntitySignature};

/// Offline-first cache for one entity collection.
///
/// Mutations try the remote store first and fall back to the durable outbox;
/// reads are served from the remote store when reachable and from the durable
/// mirror otherwise. No method here ever surfaces a remote failure to the
/// caller — the contract is "never block the user on network".
pub struct SyncCache<R: SyncRecord> {
    local: Arc<dyn LocalSlotStore>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    // Serializes outbox replay per entity type; overlapping drains would
    // double-apply non-idempotent inserts.
    pub(crate) drain_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord> SyncCache<R> {
    pub fn new(local: Arc<dyn LocalSlotStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote,
            drain_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Durable slots
    // ─────────────────────────────────────────────────────────────────────

    fn read_slot<T: DeserializeOwned>(&self, slot: &str) -> Vec<T> {
        let raw = match self.local.get(slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!("failed to read {}: {}", slot, err);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(err) => {
                warn!("malformed contents in {}, starting empty: {}", slot, err);
                Vec::new()
            }
        }
    }

    fn write_slot<T: Serialize>(&self, slot: &str, items: &[T]) {
        match serde_json::to_string(items) {
            Ok(raw) => {
                if let Err(err) = self.local.set(slot, &raw) {
                    warn!("failed to persist {}: {}", slot, err);
                }
            }
            Err(err) => warn!("failed to serialize {}: {}", slot, err),
        }
    }

    /// Last-known-good snapshot of the collection.
    pub fn mirror(&self) -> Vec<R> {
        self.read_slot(R::kind().mirror_slot())
    }

    pub(crate) fn write_mirror(&self, items: &[R]) {
        self.write_slot(R::kind().mirror_slot(), items);
    }

    /// Pending mutations awaiting remote confirmation, in enqueue order.
    pub fn outbox(&self) -> Vec<OutboxEntry<R::Draft, R::Patch>> {
        self.read_slot(R::kind().outbox_slot())
    }

    fn write_outbox(&self, entries: &[OutboxEntry<R::Draft, R::Patch>]) {
        self.write_slot(R::kind().outbox_slot(), entries);
    }

    pub(crate) async fn owner(&self) -> Option<String> {
        match self.remote.current_owner_id().await {
            Ok(owner) => owner,
            Err(err) => {
                debug!(
                    "{}: owner resolution failed, staying local: {}",
                    R::kind().table(),
                    err
                );
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Public contract
    // ─────────────────────────────────────────────────────────────────────

    /// Replay pending mutations, then fetch the owner-scoped collection and
    /// overwrite the mirror. Degrades to the mirror contents on any failure;
    /// never errors.
    pub async fn list(&self) -> Vec<R> {
        let Some(owner) = self.owner().await else {
            return self.mirror();
        };
        {
            let _guard = self.drain_lock.lock().await;
            self.replay_outbox(&owner).await;
        }
        match self.fetch_and_mirror(&owner).await {
            Ok(items) => items,
            Err(err) => {
                warn!("{}: list failed, serving mirror: {}", R::kind().table(), err);
                self.mirror()
            }
        }
    }

    /// Create a record. Remote-first; on failure the record is created
    /// locally under a client-generated id and queued for replay. The
    /// returned record is optimistic (owner [`LOCAL_OWNER`]) when the remote
    /// store did not confirm.
    pub async fn create(&self, draft: R::Draft) -> R {
        if let Some(owner) = self.owner().await {
            match self.remote_insert(&owner, &draft).await {
                Ok(record) => {
                    let mut items = self.mirror();
                    items.insert(0, record.clone());
                    self.write_mirror(&items);
                    return record;
                }
                Err(err) => warn!(
                    "{}: create failed, queueing for replay: {}",
                    R::kind().table(),
                    err
                ),
            }
        }
        self.create_local(draft)
    }

    /// Update a record. Remote-first; on failure the patch lands in the
    /// outbox (folded into a pending create when one exists for `id`) and
    /// the mirror record is patched in place. Returns the record as now
    /// mirrored, or `None` when `id` is unknown locally and the remote call
    /// failed.
    pub async fn update(&self, id: &str, patch: R::Patch) -> Option<R> {
        if let Some(owner) = self.owner().await {
            match self.remote_update(&owner, id, &patch).await {
                Ok(record) => {
                    let mut items = self.mirror();
                    if let Some(existing) = items.iter_mut().find(|item| item.id() == id) {
                        *existing = record.clone();
                    }
                    self.write_mirror(&items);
                    return Some(record);
                }
                Err(err) => warn!(
                    "{}: update failed, queueing for replay: {}",
                    R::kind().table(),
                    err
                ),
            }
        }
        self.update_local(id, patch)
    }

    /// Delete a record. The mirror entry is removed unconditionally — a
    /// user-visible delete must not silently fail to disappear. When the
    /// remote call fails the delete is queued, unless the record's create is
    /// itself still pending, in which case the two cancel out without any
    /// remote call.
    pub async fn delete(&self, id: &str) -> bool {
        let mut confirmed = false;
        if let Some(owner) = self.owner().await {
            match self.remote.delete(R::kind().table(), id, &owner).await {
                Ok(()) => confirmed = true,
                Err(err) => warn!(
                    "{}: delete failed, queueing for replay: {}",
                    R::kind().table(),
                    err
                ),
            }
        }
        if !confirmed {
            self.enqueue_delete(id);
        }
        let mut items = self.mirror();
        items.retain(|item| item.id() != id);
        self.write_mirror(&items);
        true
    }

    /// Replay pending mutations in enqueue order, then reconcile the mirror
    /// from the remote collection (even when the queue was empty — the
    /// refetch picks up server-side changes this client never saw). Returns
    /// `false` without touching the queue when the remote store or owner is
    /// unavailable.
    pub async fn drain_outbox(&self) -> bool {
        let Some(owner) = self.owner().await else {
            return false;
        };
        let _guard = self.drain_lock.lock().await;
        self.replay_outbox(&owner).await;
        if let Err(err) = self.fetch_and_mirror(&owner).await {
            warn!(
                "{}: post-drain refetch failed: {}",
                R::kind().table(),
                err
            );
        }
        true
    }

    /// Collection signature for staleness checks; falls back to a mirror
    /// signature when the remote store or owner is unavailable.
    pub async fn signature(&self) -> EntitySignature {
        if let Some(owner) = self.owner().await {
            match self.remote.select(R::kind().table(), &owner, None).await {
                Ok(rows) => return signature_of_rows(&rows),
                Err(err) => debug!(
                    "{}: remote signature unavailable, using mirror: {}",
                    R::kind().table(),
                    err
                ),
            }
        }
        Self::mirror_signature(&self.mirror())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    async fn fetch_and_mirror(&self, owner: &str) -> Result<Vec<R>> {
        let rows = self.remote.select(R::kind().table(), owner, None).await?;
        let mut items = rows
            .into_iter()
            .map(serde_json::from_value::<R>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        items.sort_by(|a, b| b.sort_timestamp().cmp(&a.sort_timestamp()));
        self.write_mirror(&items);
        Ok(items)
    }

    async fn remote_insert(&self, owner: &str, draft: &R::Draft) -> Result<R> {
        let row = draft_row(draft, owner)?;
        let created = self.remote.insert(R::kind().table(), row).await?;
        Ok(serde_json::from_value(created)?)
    }

    async fn remote_update(&self, owner: &str, id: &str, patch: &R::Patch) -> Result<R> {
        let changes = serde_json::to_value(patch)?;
        let updated = self
            .remote
            .update(R::kind().table(), id, owner, changes)
            .await?;
        Ok(serde_json::from_value(updated)?)
    }

    fn create_local(&self, draft: R::Draft) -> R {
        let id = Uuid::new_v4().to_string();
        let mut entries = self.outbox();
        entries.push(OutboxEntry::Create {
            entity_id: id.clone(),
            draft: draft.clone(),
            enqueued_at: Utc::now(),
        });
        self.write_outbox(&entries);

        let record = R::from_draft(&draft, id, LOCAL_OWNER.to_string());
        let mut items = self.mirror();
        items.insert(0, record.clone());
        self.write_mirror(&items);
        record
    }

    fn update_local(&self, id: &str, patch: R::Patch) -> Option<R> {
        let mut entries = self.outbox();
        let mut folded = false;
        for entry in entries.iter_mut() {
            if let OutboxEntry::Create {
                entity_id, draft, ..
            } = entry
            {
                if entity_id.as_str() == id {
                    R::merge_into_draft(draft, &patch);
                    folded = true;
                    break;
                }
            }
        }
        if !folded {
            entries.push(OutboxEntry::Update {
                entity_id: id.to_string(),
                patch: patch.clone(),
                enqueued_at: Utc::now(),
            });
        }
        self.write_outbox(&entries);

        let mut items = self.mirror();
        let mut updated = None;
        if let Some(existing) = items.iter_mut().find(|item| item.id() == id) {
            existing.apply_patch(&patch);
            updated = Some(existing.clone());
        }
        self.write_mirror(&items);
        updated
    }

    fn enqueue_delete(&self, id: &str) {
        let mut entries = self.outbox();
        let pending_create = entries.iter().any(
            |entry| matches!(entry, OutboxEntry::Create { entity_id, .. } if entity_id == id),
        );
        if pending_create {
            // The record never reached the remote store; dropping the queued
            // create makes both sides a no-op.
            entries.retain(|entry| entry.entity_id() != id);
        } else {
            // Queued updates for a row being deleted are moot.
            entries.retain(|entry| {
                !matches!(entry, OutboxEntry::Update { entity_id, .. } if entity_id == id)
            });
            entries.push(OutboxEntry::Delete {
                entity_id: id.to_string(),
                enqueued_at: Utc::now(),
            });
        }
        self.write_outbox(&entries);
    }

    /// Replays queued entries against the remote store; successes are
    /// dropped, failures stay queued in place for the next pass.
    pub(crate) async fn replay_outbox(&self, owner: &str) {
        let entries = self.outbox();
        if entries.is_empty() {
            return;
        }
        let mut kept = Vec::new();
        for entry in entries {
            if let Err(err) = self.replay_entry(owner, &entry).await {
                warn!(
                    "{}: outbox replay of {:?} failed, keeping entry: {}",
                    R::kind().table(),
                    entry.operation(),
                    err
                );
                kept.push(entry);
            }
        }
        self.write_outbox(&kept);
    }

    async fn replay_entry(
        &self,
        owner: &str,
        entry: &OutboxEntry<R::Draft, R::Patch>,
    ) -> Result<()> {
        match entry {
            OutboxEntry::Create { draft, .. } => {
                self.remote
                    .insert(R::kind().table(), draft_row(draft, owner)?)
                    .await?;
            }
            OutboxEntry::Update {
                entity_id, patch, ..
            } => {
                let changes = serde_json::to_value(patch)?;
                self.remote
                    .update(R::kind().table(), entity_id, owner, changes)
                    .await?;
            }
            OutboxEntry::Delete { entity_id, .. } => {
                self.remote
                    .delete(R::kind().table(), entity_id, owner)
                    .await?;
            }
        }
        Ok(())
    }

    fn mirror_signature(items: &[R]) -> EntitySignature {
        let latest_ts = items
            .iter()
            .filter_map(|item| item.updated_at().or_else(|| item.created_at()))
            .map(|ts| ts.timestamp_millis())
            .max()
            .unwrap_or(0);
        EntitySignature {
            count: items.len() as u64,
            latest_ts,
        }
    }
}

/// Serialize a draft and stamp the owning user onto it.
fn draft_row<D: Serialize>(draft: &D, owner: &str) -> Result<Value> {
    let mut row = serde_json::to_value(draft)?;
    match row.as_object_mut() {
        Some(map) => {
            map.insert("user_id".to_string(), Value::String(owner.to_string()));
            Ok(row)
        }
        None => Err(Error::payload("create payload must be a JSON object")),
    }
}

/// Object-safe view of a cache, used by whole-app passes (staleness monitor,
/// change listener).
#[async_trait]
pub trait EntityCache: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Full refresh: replay the outbox, refetch, overwrite the mirror.
    async fn refresh(&self);

    async fn signature(&self) -> EntitySignature;
}

#[async_trait]
impl<R: SyncRecord> EntityCache for SyncCache<R> {
    fn kind(&self) -> EntityKind {
        R::kind()
    }

    async fn refresh(&self) {
        let _ = self.list().await;
    }

    async fn signature(&self) -> EntitySignature {
        SyncCache::signature(self).await
    }
}
