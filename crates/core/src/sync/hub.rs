//! The four entity caches behind one handle.

use std::sync::Arc;

use crate::entities::{Bank, Category, EntityKind, Goal, Transaction};
use crate::store::{LocalSlotStore, RemoteStore};

use super::signature_model::RemoteSignature;
use super::sync_cache::{EntityCache, SyncCache};

/// All sync caches of the application, sharing one slot store and one remote
/// store. Constructed once at startup.
pub struct SyncHub {
    pub transactions: Arc<SyncCache<Transaction>>,
    pub categories: Arc<SyncCache<Category>>,
    pub banks: Arc<SyncCache<Bank>>,
    pub goals: Arc<SyncCache<Goal>>,
}

impl SyncHub {
    pub fn new(local: Arc<dyn LocalSlotStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            transactions: Arc::new(SyncCache::new(local.clone(), remote.clone())),
            categories: Arc::new(SyncCache::new(local.clone(), remote.clone())),
            banks: Arc::new(SyncCache::new(local.clone(), remote.clone())),
            goals: Arc::new(SyncCache::new(local, remote)),
        }
    }

    /// Caches in the order whole-app passes visit them.
    pub fn caches(&self) -> [Arc<dyn EntityCache>; 4] {
        [
            self.transactions.clone(),
            self.categories.clone(),
            self.banks.clone(),
            self.goals.clone(),
        ]
    }

    /// Cache responsible for a remote table, if the table is synced.
    pub fn cache_for(&self, table: &str) -> Option<Arc<dyn EntityCache>> {
        let kind = EntityKind::from_table(table)?;
        self.caches().into_iter().find(|cache| cache.kind() == kind)
    }

    /// Refresh every cache: replay outboxes, refetch, overwrite mirrors.
    pub async fn refresh_all(&self) {
        for cache in self.caches() {
            cache.refresh().await;
        }
    }

    /// Current signature across all entity kinds (remote when reachable,
    /// mirror fallback otherwise).
    pub async fn compute_signature(&self) -> RemoteSignature {
        let mut signature = RemoteSignature::default();
        for cache in self.caches() {
            signature.set(cache.kind(), cache.signature().await);
        }
        signature
    }
}
