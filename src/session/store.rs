//! Single-slot session storage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::audit::{category, AuditLog};
use crate::clock::Clock;
use crate::security::codec::Codec;
use crate::security::token::secure_token;
use crate::storage::{KeyValueStore, SESSION_SLOT};
use crate::Result;

/// Bytes of randomness in a session ID.
const SESSION_ID_BYTES: usize = 64;

/// An authenticated session.
///
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 128-character hex identifier.
    pub id: String,
    /// Opaque user reference supplied at login.
    pub user: Value,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_activity: i64,
}

impl Session {
    /// Whether the session has expired at `now`.
    ///
    /// The expiry instant itself already counts as expired, so a zero
    /// timeout yields a session that is never readable.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Milliseconds since the last recorded activity.
    pub fn idle_millis(&self, now: i64) -> i64 {
        now - self.last_activity
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a session in milliseconds.
    pub timeout_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 86_400_000,
        }
    }
}

/// Stores at most one session in the session-scoped [`SESSION_SLOT`].
///
/// Creating a session overwrites whatever session the slot held.
pub struct SessionStore {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    codec: Arc<Codec>,
    storage: Arc<dyn KeyValueStore>,
    audit: Arc<AuditLog>,
}

impl SessionStore {
    pub fn new(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        codec: Arc<Codec>,
        storage: Arc<dyn KeyValueStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            config,
            clock,
            codec,
            storage,
            audit,
        }
    }

    /// Create a session for `user` and return its ID.
    ///
    /// Only a failing random source is reported; a storage failure is logged
    /// and the ID is still returned.
    pub fn create(&self, user: Value) -> Result<String> {
        let id = secure_token(SESSION_ID_BYTES)?;
        let now = self.clock.now_millis();
        let session = Session {
            id: id.clone(),
            user,
            created_at: now,
            expires_at: now.saturating_add(self.config.timeout_ms),
            last_activity: now,
        };

        self.save(&session);
        let details = match session.user.get("id") {
            Some(user_id) => json!({ "userId": user_id }),
            None => json!({}),
        };
        self.audit.record(category::AUTH, "Session created", details);
        Ok(id)
    }

    /// Read the current session, refreshing its last activity.
    ///
    /// Returns `None` when the slot is empty or unreadable. An expired
    /// session is destroyed and `None` returned. `expires_at` is never
    /// extended.
    pub fn get(&self) -> Option<Session> {
        let encoded = match self.storage.get(SESSION_SLOT) {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read session slot");
                return None;
            }
        };

        let mut session: Session = match self.codec.decode(&encoded) {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "ignoring unreadable session");
                return None;
            }
        };

        let now = self.clock.now_millis();
        if session.is_expired(now) {
            self.destroy();
            return None;
        }

        session.last_activity = now;
        self.save(&session);
        Some(session)
    }

    /// Remove the current session. Removing an absent session is a no-op
    /// apart from the audit record.
    pub fn destroy(&self) {
        if let Err(e) = self.storage.remove(SESSION_SLOT) {
            warn!(error = %e, "failed to remove session slot");
        }
        self.audit
            .record(category::AUTH, "Session destroyed", json!({}));
    }

    /// Configured session lifetime.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn save(&self, session: &Session) {
        let result = self
            .codec
            .encode(session)
            .and_then(|encoded| self.storage.set(SESSION_SLOT, &encoded));
        if let Err(e) = result {
            warn!(error = %e, "failed to save session");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    const START: i64 = 1_700_000_000_000;

    struct Fixture {
        store: SessionStore,
        clock: Arc<ManualClock>,
        slots: Arc<MemoryStore>,
        audit: Arc<AuditLog>,
    }

    fn fixture(timeout_ms: i64) -> Fixture {
        let clock = Arc::new(ManualClock::new(START));
        let codec = Arc::new(Codec::generate().unwrap());
        let slots = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditLog::new(
            clock.clone(),
            codec.clone(),
            Arc::new(MemoryStore::new()),
        ));
        let store = SessionStore::new(
            SessionConfig { timeout_ms },
            clock.clone(),
            codec,
            slots.clone(),
            audit.clone(),
        );
        Fixture {
            store,
            clock,
            slots,
            audit,
        }
    }

    #[test]
    fn test_create_and_get() {
        let f = fixture(1_000);
        let id = f.store.create(json!({"id": "u1", "name": "Dana"})).unwrap();
        assert_eq!(id.len(), 128);

        let session = f.store.get().unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.user["name"], "Dana");
        assert_eq!(session.created_at, START);
        assert_eq!(session.expires_at, START + 1_000);
    }

    #[test]
    fn test_get_refreshes_last_activity_only() {
        let f = fixture(10_000);
        f.store.create(json!({"id": "u1"})).unwrap();

        f.clock.advance(4_000);
        let session = f.store.get().unwrap();
        assert_eq!(session.last_activity, START + 4_000);
        assert_eq!(session.expires_at, START + 10_000);

        // Each read refreshes again.
        f.clock.advance(1_000);
        let again = f.store.get().unwrap();
        assert_eq!(again.last_activity, START + 5_000);
        assert_eq!(again.idle_millis(START + 6_000), 1_000);
    }

    #[test]
    fn test_zero_timeout_is_immediately_expired() {
        let f = fixture(0);
        f.store.create(json!({"id": "u1"})).unwrap();

        assert!(f.store.get().is_none());
        assert!(f.slots.get(SESSION_SLOT).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_is_destroyed() {
        let f = fixture(1_000);
        f.store.create(json!({"id": "u1"})).unwrap();

        f.clock.advance(999);
        assert!(f.store.get().is_some());

        f.clock.advance(1);
        assert!(f.store.get().is_none());
        assert!(f.store.get().is_none());

        let auth = f.audit.query(&AuditFilter::new().category(category::AUTH));
        assert_eq!(auth.last().unwrap().action, "Session destroyed");
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let f = fixture(i64::MAX);
        f.store.create(json!({"id": "u1"})).unwrap();

        f.clock.advance(365 * 86_400_000);
        let session = f.store.get().unwrap();
        assert_eq!(session.expires_at, i64::MAX);
    }

    #[test]
    fn test_created_event_omits_missing_user_id() {
        let f = fixture(1_000);
        f.store.create(json!({"name": "anonymous"})).unwrap();

        let auth = f.audit.query(&AuditFilter::new().category(category::AUTH));
        assert_eq!(auth[0].action, "Session created");
        assert_eq!(auth[0].details, json!({}));
    }

    #[test]
    fn test_get_without_session() {
        let f = fixture(1_000);
        assert!(f.store.get().is_none());
    }

    #[test]
    fn test_corrupt_slot_is_absent() {
        let f = fixture(1_000);
        f.slots.set(SESSION_SLOT, "not-a-valid-encoded-string").unwrap();
        assert!(f.store.get().is_none());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let f = fixture(1_000);
        f.store.create(json!({"id": "u1"})).unwrap();

        f.store.destroy();
        f.store.destroy();
        assert!(f.store.get().is_none());
    }

    #[test]
    fn test_new_session_overwrites_previous() {
        let f = fixture(1_000);
        let first = f.store.create(json!({"id": "u1"})).unwrap();
        let second = f.store.create(json!({"id": "u2"})).unwrap();

        assert_ne!(first, second);
        let session = f.store.get().unwrap();
        assert_eq!(session.id, second);
        assert_eq!(session.user["id"], "u2");
    }

    #[test]
    fn test_session_events_are_audited() {
        let f = fixture(1_000);
        f.store.create(json!({"id": "u42"})).unwrap();
        f.store.destroy();

        let auth = f.audit.query(&AuditFilter::new().category(category::AUTH));
        assert_eq!(auth.len(), 2);
        assert_eq!(auth[0].action, "Session created");
        assert_eq!(auth[0].details["userId"], "u42");
        assert_eq!(auth[1].action, "Session destroyed");
    }

    #[test]
    fn test_session_json_shape() {
        let session = Session {
            id: "abc".into(),
            user: json!({"id": 1}),
            created_at: 1,
            expires_at: 2,
            last_activity: 3,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(
            value,
            json!({"id": "abc", "user": {"id": 1}, "createdAt": 1, "expiresAt": 2, "lastActivity": 3})
        );
    }
}
