//! Hosted-backend adapters for the saldo sync core: a REST row store
//! (PostgREST-style table endpoints) and a websocket change feed.

mod client;
mod error;
mod realtime;

pub use client::PostgrestClient;
pub use error::{RemoteError, Result};
pub use realtime::RealtimeFeed;
