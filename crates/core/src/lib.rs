//! Offline-first sync core for the saldo personal-finance tracker.
//!
//! The application keeps working while disconnected: every collection
//! (transactions, categories, banks, goals) is served from a durable local
//! mirror, mutations that the remote store cannot confirm land in a durable
//! outbox queue, and a staleness monitor decides when the mirrors must be
//! reconciled against the remote source of truth.
//!
//! The remote database, its authentication, and its push channel are external
//! collaborators consumed through the traits in [`store`]; adapter crates
//! provide the concrete implementations.

pub mod entities;
pub mod errors;
pub mod store;
pub mod sync;

pub use errors::{Error, Result};
