//! Security manager façade.
//!
//! [`SecurityManager`] is the one context object the rest of an application
//! holds. It wires every component to the same clock, codec and storage
//! scopes and owns the periodic cleanup task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditFilter, AuditLog, ClientContext};
use crate::clock::{Clock, SystemClock};
use crate::security::{
    Codec, CsrfGuard, FileDescriptor, PasswordHasher, RateDecision, RateLimitConfig, RateLimiter,
    Sha256Hasher, TokenGenerator, UploadPolicy, CONTENT_SECURITY_POLICY,
};
use crate::session::{Session, SessionConfig, SessionStore};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::Result;

/// Interval of the background cleanup task.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Tunables consumed from the configuration catalogue.
#[derive(Debug, Clone, Default)]
pub struct SecuritySettings {
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
    pub upload: UploadPolicy,
    /// Client context attached to audit entries.
    pub client: ClientContext,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Rate trackers evicted for inactivity.
    pub evicted_trackers: usize,
    /// Audit entries older than the retention period.
    pub pruned_entries: usize,
}

/// Builder for [`SecurityManager`].
pub struct SecurityManagerBuilder {
    settings: SecuritySettings,
    clock: Option<Arc<dyn Clock>>,
    codec: Option<Codec>,
    session_storage: Option<Arc<dyn KeyValueStore>>,
    durable_storage: Option<Arc<dyn KeyValueStore>>,
    hasher: Option<Box<dyn PasswordHasher>>,
}

impl SecurityManagerBuilder {
    fn new(settings: SecuritySettings) -> Self {
        Self {
            settings,
            clock: None,
            codec: None,
            session_storage: None,
            durable_storage: None,
            hasher: None,
        }
    }

    /// Use a custom clock (tests use [`ManualClock`](crate::ManualClock)).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a specific codec instead of generating a fresh key.
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Storage for the `session` and `csrf_token` slots.
    pub fn session_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Storage for the `audit_log` slot.
    pub fn durable_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.durable_storage = Some(storage);
        self
    }

    /// Replace the password digest.
    pub fn password_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
        self.hasher = Some(Box::new(hasher));
        self
    }

    /// Build the manager, restoring any persisted audit trail.
    ///
    /// Fails only when the random source cannot produce a codec key.
    pub fn build(self) -> Result<SecurityManager> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let codec = Arc::new(match self.codec {
            Some(codec) => codec,
            None => Codec::generate()?,
        });
        let session_storage = self
            .session_storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let durable_storage = self
            .durable_storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let audit = Arc::new(AuditLog::new(
            clock.clone(),
            codec.clone(),
            durable_storage,
        ));
        let restored = audit.restore();
        audit.set_client_context(self.settings.client.clone());

        let rate_limiter = RateLimiter::new(
            self.settings.rate_limit.clone(),
            clock.clone(),
            audit.clone(),
        );
        let sessions = SessionStore::new(
            self.settings.session.clone(),
            clock.clone(),
            codec.clone(),
            session_storage.clone(),
            audit.clone(),
        );

        let manager = SecurityManager {
            tokens: TokenGenerator::new(clock.clone()),
            csrf: CsrfGuard::new(session_storage),
            hasher: self.hasher.unwrap_or_else(|| Box::new(Sha256Hasher)),
            upload: self.settings.upload,
            clock,
            codec,
            audit,
            rate_limiter,
            sessions,
        };

        info!(policy = CONTENT_SECURITY_POLICY, "security headers configured");
        info!(restored_audit_entries = restored, "security manager initialized");
        Ok(manager)
    }
}

/// Composition root for all security components.
pub struct SecurityManager {
    clock: Arc<dyn Clock>,
    codec: Arc<Codec>,
    audit: Arc<AuditLog>,
    rate_limiter: RateLimiter,
    sessions: SessionStore,
    csrf: CsrfGuard,
    tokens: TokenGenerator,
    upload: UploadPolicy,
    hasher: Box<dyn PasswordHasher>,
}

impl SecurityManager {
    /// Manager on the system clock with in-memory storage.
    pub fn new(settings: SecuritySettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn builder(settings: SecuritySettings) -> SecurityManagerBuilder {
        SecurityManagerBuilder::new(settings)
    }

    // --- Rate limiting -----------------------------------------------------

    /// Check and count a request from `identifier`.
    pub fn check_rate_limit(&self, identifier: &str) -> Result<RateDecision> {
        self.rate_limiter.check(identifier)
    }

    pub fn block_identifier(&self, identifier: &str, reason: &str) -> Result<()> {
        self.rate_limiter.block_identifier(identifier, reason)
    }

    pub fn block_temporarily(&self, identifier: &str, reason: &str) -> Result<()> {
        self.rate_limiter.block_temporarily(identifier, reason)
    }

    pub fn unblock_identifier(&self, identifier: &str) -> Result<()> {
        self.rate_limiter.unblock_identifier(identifier)
    }

    // --- Tokens ------------------------------------------------------------

    pub fn secure_token(&self, length: usize) -> Result<String> {
        self.tokens.secure_token(length)
    }

    pub fn document_id(&self) -> Result<String> {
        self.tokens.document_id()
    }

    pub fn signature_token(&self) -> Result<String> {
        self.tokens.signature_token()
    }

    // --- Validation --------------------------------------------------------

    /// Whether an upload passes the configured type and size checks.
    pub fn accepts_upload(&self, file: &FileDescriptor) -> bool {
        self.upload.accepts(file)
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload
    }

    // --- Sessions ----------------------------------------------------------

    pub fn create_session(&self, user: Value) -> Result<String> {
        self.sessions.create(user)
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.get()
    }

    pub fn destroy_session(&self) {
        self.sessions.destroy()
    }

    // --- CSRF --------------------------------------------------------------

    pub fn issue_csrf_token(&self) -> Result<String> {
        self.csrf.issue()
    }

    pub fn verify_csrf_token(&self, candidate: &str) -> bool {
        self.csrf.verify(candidate)
    }

    // --- Passwords ---------------------------------------------------------

    pub fn hash_password(&self, password: &str) -> String {
        self.hasher.hash(password)
    }

    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        self.hasher.verify(password, digest)
    }

    // --- Audit -------------------------------------------------------------

    /// Record a security-relevant event.
    pub fn log(&self, category: &str, action: &str, details: Value) {
        self.audit.record(category, action, details)
    }

    pub fn audit_log(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit.query(filter)
    }

    // --- Headers -----------------------------------------------------------

    pub fn content_security_policy(&self) -> &'static str {
        CONTENT_SECURITY_POLICY
    }

    // --- Lifecycle ---------------------------------------------------------

    /// Evict stale rate trackers and prune audit entries past retention.
    ///
    /// Failures are logged; a failed half reports zero.
    pub fn run_cleanup(&self) -> CleanupReport {
        let evicted_trackers = self.rate_limiter.sweep().unwrap_or_else(|e| {
            warn!(error = %e, "rate tracker sweep failed");
            0
        });
        let pruned_entries = self.audit.prune_expired().unwrap_or_else(|e| {
            warn!(error = %e, "audit pruning failed");
            0
        });

        info!(evicted_trackers, pruned_entries, "security cleanup finished");
        CleanupReport {
            evicted_trackers,
            pruned_entries,
        }
    }

    /// Run [`run_cleanup`](Self::run_cleanup) every `period` on the tokio
    /// runtime. The first pass happens one period after spawning.
    pub fn spawn_cleanup(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                manager.run_cleanup();
            }
        })
    }

    // --- Components --------------------------------------------------------

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("rate_limiter", &self.rate_limiter)
            .field("sessions", &self.sessions)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}
