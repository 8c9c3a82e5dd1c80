//! Staleness monitor: decides when the mirrors must be reconciled against
//! the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::entities::EntityKind;
use crate::store::LocalSlotStore;

use super::hub::SyncHub;
use super::signature_model::{RemoteSignature, LAST_REFRESH_SLOT, SIGNATURE_SLOT};

/// Observable monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Refreshing,
}

/// What prompted a refresh pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Startup,
    Foreground,
    Online,
    LocalMutation,
    Periodic,
}

/// Compares cheap collection signatures against the persisted baseline and
/// forces a full refresh of every cache when they diverge.
///
/// Passes are serialized; whichever trigger fires, the monitor is back in
/// [`MonitorState::Idle`] when the pass ends, refresh or not, success or not.
pub struct StalenessMonitor {
    hub: Arc<SyncHub>,
    local: Arc<dyn LocalSlotStore>,
    pass_lock: Mutex<()>,
    refreshing: AtomicBool,
}

impl StalenessMonitor {
    pub fn new(hub: Arc<SyncHub>, local: Arc<dyn LocalSlotStore>) -> Self {
        Self {
            hub,
            local,
            pass_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.refreshing.load(Ordering::Relaxed) {
            MonitorState::Refreshing
        } else {
            MonitorState::Idle
        }
    }

    /// When the last successful full refresh finished, if any.
    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.local.get(LAST_REFRESH_SLOT).ok().flatten()?;
        let millis: i64 = raw.parse().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// Signature check: refresh every cache when the current signature
    /// diverges from the persisted baseline; otherwise just move the
    /// baseline forward without any list calls.
    pub async fn check_and_refresh(&self, trigger: RefreshTrigger) {
        let _guard = self.pass_lock.lock().await;
        self.refreshing.store(true, Ordering::Relaxed);
        debug!("staleness check ({:?})", trigger);

        let previous = self.last_signature();
        let current = self.hub.compute_signature().await;
        if previous.differs(&current) {
            debug!("signatures diverged, refreshing all caches");
            self.refresh_all_locked().await;
        } else {
            self.persist_signature(&current);
        }

        self.refreshing.store(false, Ordering::Relaxed);
    }

    /// Unconditional full refresh; the baseline is recomputed afterwards so
    /// the next check starts from what was actually fetched.
    pub async fn refresh_all(&self, trigger: RefreshTrigger) {
        let _guard = self.pass_lock.lock().await;
        self.refreshing.store(true, Ordering::Relaxed);
        debug!("full refresh ({:?})", trigger);
        self.refresh_all_locked().await;
        self.refreshing.store(false, Ordering::Relaxed);
    }

    /// Write notification from a cache: any local mutation forces a refresh.
    pub async fn mark_write(&self, kind: EntityKind) {
        debug!("{} write observed", kind.table());
        self.refresh_all(RefreshTrigger::LocalMutation).await;
    }

    async fn refresh_all_locked(&self) {
        self.hub.refresh_all().await;
        self.stamp_refresh();
        let refreshed = self.hub.compute_signature().await;
        self.persist_signature(&refreshed);
    }

    fn last_signature(&self) -> RemoteSignature {
        let raw = match self.local.get(SIGNATURE_SLOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return RemoteSignature::default(),
            Err(err) => {
                warn!("failed to read {}: {}", SIGNATURE_SLOT, err);
                return RemoteSignature::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(signature) => signature,
            Err(err) => {
                warn!("malformed signature baseline, resetting: {}", err);
                RemoteSignature::default()
            }
        }
    }

    fn persist_signature(&self, signature: &RemoteSignature) {
        match serde_json::to_string(signature) {
            Ok(raw) => {
                if let Err(err) = self.local.set(SIGNATURE_SLOT, &raw) {
                    warn!("failed to persist {}: {}", SIGNATURE_SLOT, err);
                }
            }
            Err(err) => warn!("failed to serialize signature baseline: {}", err),
        }
    }

    fn stamp_refresh(&self) {
        let stamp = Utc::now().timestamp_millis().to_string();
        if let Err(err) = self.local.set(LAST_REFRESH_SLOT, &stamp) {
            warn!("failed to persist {}: {}", LAST_REFRESH_SLOT, err);
        }
    }
}
