//! Bounded, filterable audit trail.
//!
//! The in-memory sequence is authoritative. After every append the whole
//! sequence is encoded and written to the durable [`AUDIT_SLOT`]; that copy
//! only serves to recover the trail after a restart, so failing to write it
//! is logged and otherwise ignored.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::SecurityError;
use crate::security::codec::Codec;
use crate::storage::{KeyValueStore, AUDIT_SLOT};
use crate::Result;

/// Maximum number of entries kept in memory.
pub const MAX_ENTRIES: usize = 1000;
/// Age after which entries are pruned by cleanup.
pub const RETENTION_DAYS: i64 = 7;

/// Well-known audit categories.
pub mod category {
    /// Session lifecycle events.
    pub const AUTH: &str = "auth";
    /// Rate limiting and block list events.
    pub const SECURITY: &str = "security";
}

/// Environment of the client that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    /// User agent string.
    pub agent: String,
    /// Location (page URL or endpoint) the event came from.
    pub location: String,
}

impl ClientContext {
    pub fn new(agent: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            location: location.into(),
        }
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ISO-8601 timestamp with millisecond precision.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub action: String,
    /// Free-form key-value details.
    pub details: Value,
    pub client: ClientContext,
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Query filter. Unset fields match everything; date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.category.as_ref().map_or(true, |c| *c == entry.category)
            && self.start.map_or(true, |s| entry.timestamp >= s)
            && self.end.map_or(true, |e| entry.timestamp <= e)
    }
}

/// Append-only event ledger capped at [`MAX_ENTRIES`].
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    client: RwLock<ClientContext>,
    clock: Arc<dyn Clock>,
    codec: Arc<Codec>,
    storage: Arc<dyn KeyValueStore>,
}

impl AuditLog {
    /// Create an empty log persisting to `storage`.
    pub fn new(clock: Arc<dyn Clock>, codec: Arc<Codec>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            client: RwLock::new(ClientContext::default()),
            clock,
            codec,
            storage,
        }
    }

    /// Set the client context attached to subsequent entries.
    pub fn set_client_context(&self, context: ClientContext) {
        if let Ok(mut client) = self.client.write() {
            *client = context;
        }
    }

    /// Append an event, evicting the oldest past capacity, then persist.
    ///
    /// Never fails: a poisoned lock or a storage error is logged.
    pub fn record(&self, category: &str, action: &str, details: Value) {
        let client = self
            .client
            .read()
            .map(|c| c.clone())
            .unwrap_or_default();
        let entry = AuditEntry {
            timestamp: self.clock.now(),
            category: category.to_string(),
            action: action.to_string(),
            details: if details.is_null() {
                Value::Object(Default::default())
            } else {
                details
            },
            client,
        };
        debug!(category, action, "audit event");

        match self.entries.write() {
            Ok(mut entries) => {
                entries.push_back(entry);
                while entries.len() > MAX_ENTRIES {
                    entries.pop_front();
                }
                // Written under the lock so the newest snapshot always wins.
                self.persist(&entries);
            }
            Err(_) => warn!(category, action, "audit log lock poisoned, event dropped"),
        }
    }

    fn persist(&self, entries: &VecDeque<AuditEntry>) {
        let result = self
            .codec
            .encode(entries)
            .and_then(|encoded| self.storage.set(AUDIT_SLOT, &encoded));
        if let Err(e) = result {
            warn!(error = %e, "failed to save audit log");
        }
    }

    /// Entries matching `filter`, oldest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.query(&AuditFilter::default())
    }

    /// Drop entries not newer than `cutoff`. Returns how many were removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SecurityError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|e| e.timestamp > cutoff);

        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries);
        }
        Ok(removed)
    }

    /// Drop entries older than the retention period relative to the clock.
    pub fn prune_expired(&self) -> Result<usize> {
        let cutoff = self.clock.now() - Duration::days(RETENTION_DAYS);
        self.prune_older_than(cutoff)
    }

    /// Reload the persisted snapshot, replacing the in-memory sequence.
    ///
    /// A missing or unreadable snapshot leaves the log untouched. Returns the
    /// number of restored entries.
    pub fn restore(&self) -> usize {
        let encoded = match self.storage.get(AUDIT_SLOT) {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "failed to read audit log snapshot");
                return 0;
            }
        };

        let mut restored: VecDeque<AuditEntry> = match self.codec.decode(&encoded) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "discarding unreadable audit log snapshot");
                return 0;
            }
        };
        while restored.len() > MAX_ENTRIES {
            restored.pop_front();
        }

        let count = restored.len();
        match self.entries.write() {
            Ok(mut entries) => *entries = restored,
            Err(_) => return 0,
        }
        debug!(count, "audit log restored");
        count
    }

    /// Number of entries in memory.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export entries matching `filter` as a JSON array.
    pub fn to_json(&self, filter: &AuditFilter) -> Result<String> {
        serde_json::to_string_pretty(&self.query(filter))
            .map_err(|e| SecurityError::Encoding(e.to_string()))
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
