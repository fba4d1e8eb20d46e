//! Abstract key-value slot storage.
//!
//! Two scopes are used by the crate: a session-scoped store (the `session`
//! and `csrf_token` slots) and a durable store (the `audit_log` slot). Both
//! are plain [`KeyValueStore`] implementations; which is which is decided by
//! whoever wires the [`SecurityManager`](crate::SecurityManager).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::SecurityError;
use crate::Result;

/// Slot holding the encoded active session.
pub const SESSION_SLOT: &str = "session";
/// Slot holding the raw CSRF token.
pub const CSRF_SLOT: &str = "csrf_token";
/// Slot holding the encoded audit sequence.
pub const AUDIT_SLOT: &str = "audit_log";

/// A string-keyed, string-valued persistent store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| SecurityError::LockPoisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| SecurityError::LockPoisoned)?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| SecurityError::LockPoisoned)?;
        slots.remove(key);
        Ok(())
    }
}
