//! Abstract store collaborators: durable local slots, the remote row store,
//! and the push change feed.

mod feed;
mod local;
mod remote;

pub use feed::{ChangeEvent, ChangeFeed, ChangeSubscription, FeedStatus};
pub use local::{LocalSlotStore, MemorySlotStore};
pub use remote::{RemoteStore, TimeRange};
