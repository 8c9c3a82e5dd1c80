//! Push change-notification channel of the remote store.

use tokio::sync::{mpsc, watch};

use crate::errors::Result;

/// Lifecycle of one push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Requested but not yet acknowledged by the remote store.
    Pending,
    /// Acknowledged; notifications are flowing.
    Subscribed,
    /// The channel failed or closed; it will not deliver notifications.
    Errored,
}

/// A row-change notification for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
}

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug)]
pub struct ChangeSubscription {
    pub events: mpsc::Receiver<ChangeEvent>,
    pub status: watch::Receiver<FeedStatus>,
}

/// Push change channel. Subscriptions that never reach
/// [`FeedStatus::Subscribed`] are covered by the listener's polling fallback.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: &str) -> Result<ChangeSubscription>;
}
