//! Durable string-keyed slot storage.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{Error, Result};

/// Durable string-keyed slot store backing the mirrors and outboxes.
///
/// One instance is constructed at application start, injected into every sync
/// cache, and lives for the process lifetime. All access is synchronous.
pub trait LocalSlotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory slot store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalSlotStore for MemorySlotStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| Error::store("slot map lock poisoned"))?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::store("slot map lock poisoned"))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = MemorySlotStore::new();
        assert_eq!(store.get("banks.mirror").expect("get"), None);
        store.set("banks.mirror", "[]").expect("set");
        store.set("banks.mirror", "[{}]").expect("overwrite");
        assert_eq!(
            store.get("banks.mirror").expect("get"),
            Some("[{}]".to_string())
        );
    }
}
