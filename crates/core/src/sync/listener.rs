//! Change-notification listener: push subscriptions with a polling fallback.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::entities::EntityKind;
use crate::store::{ChangeEvent, ChangeFeed, FeedStatus};

use super::hub::SyncHub;
use super::staleness_monitor::{RefreshTrigger, StalenessMonitor};

/// Fixed poll cadence used while the push channel is unconfirmed.
pub const CHANGE_POLL_INTERVAL_SECS: u64 = 5;

const EVENT_BUFFER: usize = 64;

/// Dispatches push change notifications to the affected cache, polling the
/// staleness monitor on a fixed interval for as long as any subscription has
/// not been confirmed.
pub struct ChangeListener {
    hub: Arc<SyncHub>,
    monitor: Arc<StalenessMonitor>,
    poll_interval: Duration,
}

impl ChangeListener {
    pub fn new(hub: Arc<SyncHub>, monitor: Arc<StalenessMonitor>) -> Self {
        Self {
            hub,
            monitor,
            poll_interval: Duration::from_secs(CHANGE_POLL_INTERVAL_SECS),
        }
    }

    /// Override the fallback poll cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Subscribe to every entity table and dispatch refreshes until the
    /// caller drops the task. Tables whose subscription fails or never
    /// confirms stay covered by the polling fallback.
    pub async fn run(&self, feed: Arc<dyn ChangeFeed>) {
        let (event_tx, mut events) = mpsc::channel::<ChangeEvent>(EVENT_BUFFER);
        let mut statuses: Vec<watch::Receiver<FeedStatus>> = Vec::new();

        for kind in EntityKind::ALL {
            match feed.subscribe(kind.table()) {
                Ok(subscription) => {
                    statuses.push(subscription.status);
                    let forward = event_tx.clone();
                    let mut incoming = subscription.events;
                    tokio::spawn(async move {
                        while let Some(event) = incoming.recv().await {
                            if forward.send(event).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(err) => warn!(
                    "{}: change subscription failed, relying on polling: {}",
                    kind.table(),
                    err
                ),
            }
        }

        // `event_tx` stays alive in this scope so `events.recv()` keeps
        // pending even when every subscription has failed.
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { break };
                    debug!("change notification for {}", event.table);
                    match self.hub.cache_for(&event.table) {
                        Some(cache) => cache.refresh().await,
                        None => debug!("ignoring change for unsynced table {}", event.table),
                    }
                }
                _ = poll.tick() => {
                    if all_confirmed(&statuses) {
                        continue;
                    }
                    self.monitor.check_and_refresh(RefreshTrigger::Periodic).await;
                }
            }
        }
    }
}

fn all_confirmed(statuses: &[watch::Receiver<FeedStatus>]) -> bool {
    !statuses.is_empty()
        && statuses
            .iter()
            .all(|status| *status.borrow() == FeedStatus::Subscribed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::store::{ChangeSubscription, MemorySlotStore, RemoteStore};
    use crate::sync::testing::MockRemote;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Feed whose subscriptions the test drives by hand.
    #[derive(Default)]
    struct MockFeed {
        handles: Mutex<HashMap<String, (mpsc::Sender<ChangeEvent>, watch::Sender<FeedStatus>)>>,
    }

    impl MockFeed {
        fn confirm_all(&self) {
            for (_, status) in self.handles.lock().expect("handles lock").values() {
                let _ = status.send(FeedStatus::Subscribed);
            }
        }

        async fn notify(&self, table: &str) {
            let sender = {
                let handles = self.handles.lock().expect("handles lock");
                handles.get(table).expect("subscription").0.clone()
            };
            sender
                .send(ChangeEvent {
                    table: table.to_string(),
                })
                .await
                .expect("send change");
        }
    }

    impl ChangeFeed for MockFeed {
        fn subscribe(&self, table: &str) -> Result<ChangeSubscription> {
            let (event_tx, events) = mpsc::channel(8);
            let (status_tx, status) = watch::channel(FeedStatus::Pending);
            self.handles
                .lock()
                .expect("handles lock")
                .insert(table.to_string(), (event_tx, status_tx));
            Ok(ChangeSubscription { events, status })
        }
    }

    fn setup(
        poll_interval: Duration,
    ) -> (
        Arc<MockRemote>,
        Arc<SyncHub>,
        Arc<ChangeListener>,
        Arc<MockFeed>,
    ) {
        let remote = Arc::new(MockRemote::online("user-1"));
        let local = Arc::new(MemorySlotStore::new());
        let hub = Arc::new(SyncHub::new(
            local.clone(),
            remote.clone() as Arc<dyn RemoteStore>,
        ));
        let monitor = Arc::new(StalenessMonitor::new(hub.clone(), local));
        let listener =
            Arc::new(ChangeListener::new(hub.clone(), monitor).with_poll_interval(poll_interval));
        (remote, hub, listener, Arc::new(MockFeed::default()))
    }

    #[tokio::test]
    async fn change_notification_refreshes_only_that_table() {
        let (remote, hub, listener, feed) = setup(Duration::from_secs(3600));
        let feed_for_task = feed.clone() as Arc<dyn ChangeFeed>;
        let task = tokio::spawn(async move { listener.run(feed_for_task).await });

        sleep(Duration::from_millis(50)).await;
        feed.confirm_all();

        remote.seed_row(
            "banks",
            json!({
                "id": "srv-push",
                "user_id": "user-1",
                "name": "Bradesco",
                "created_at": "2026-05-01T00:00:00Z",
                "updated_at": "2026-05-01T00:00:00Z"
            }),
        );
        feed.notify("banks").await;
        sleep(Duration::from_millis(100)).await;

        let banks = hub.banks.mirror();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].name, "Bradesco");
        // Only the banks cache fetched.
        assert_eq!(remote.select_calls.load(Ordering::SeqCst), 1);
        assert!(hub.transactions.mirror().is_empty());

        task.abort();
    }

    #[tokio::test]
    async fn polls_until_every_subscription_confirms() {
        let (remote, _hub, listener, feed) = setup(Duration::from_millis(20));
        let feed_for_task = feed.clone() as Arc<dyn ChangeFeed>;
        let task = tokio::spawn(async move { listener.run(feed_for_task).await });

        // Unconfirmed subscriptions: the poll loop runs staleness checks.
        sleep(Duration::from_millis(120)).await;
        assert!(remote.select_calls.load(Ordering::SeqCst) >= 8);

        feed.confirm_all();
        sleep(Duration::from_millis(60)).await;
        let settled = remote.select_calls.load(Ordering::SeqCst);
        sleep(Duration::from_millis(120)).await;
        assert_eq!(remote.select_calls.load(Ordering::SeqCst), settled);

        task.abort();
    }
}
