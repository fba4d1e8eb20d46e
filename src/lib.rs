//! # sign-guard
//!
//! Security layer for a document-signing service.
//!
//! The crate bundles the pieces a signing front end needs in one place:
//! CSPRNG tokens and document IDs, a per-identifier rate limiter with a
//! block list, input validation for Israeli IDs and phone numbers, a
//! single-user session store, CSRF tokens, password digests and a bounded
//! audit log. [`SecurityManager`] wires them together against a shared
//! clock and storage.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sign_guard::{SecurityManager, SecuritySettings};
//! use serde_json::json;
//!
//! fn main() -> sign_guard::Result<()> {
//!     sign_guard::logging::try_init().ok();
//!
//!     let manager = SecurityManager::new(SecuritySettings::default())?;
//!
//!     if manager.check_rate_limit("203.0.113.7")?.is_allowed() {
//!         let session_id = manager.create_session(json!({ "id": "u-17" }))?;
//!         let doc = manager.document_id()?;
//!         println!("session {session_id} signing {doc}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod middleware;
pub mod security;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditFilter, AuditLog, ClientContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::{Result, SecurityError};
pub use manager::{CleanupReport, SecurityManager, SecurityManagerBuilder, SecuritySettings};
pub use security::{
    Codec, DenyReason, EncryptionKey, FileDescriptor, RateDecision, RateLimitConfig, RateLimiter,
    UploadPolicy,
};
pub use session::{Session, SessionConfig, SessionStore};
pub use storage::{KeyValueStore, MemoryStore};
