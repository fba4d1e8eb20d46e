//! Security primitives for sign-guard.
//!
//! ## Features
//!
//! - **Codec**: reversible at-rest encoding keyed by a process secret
//! - **Tokens**: CSPRNG hex tokens, document IDs and signature tokens
//! - **Rate Limiting**: minute/hour windows per identifier plus a block list
//! - **Input Validation**: email, phone, Israeli ID, upload checks, HTML escaping
//! - **CSRF**: session-scoped token issue and verification
//! - **Passwords**: digest behind a swappable trait
//!
//! ## Example
//!
//! ```rust
//! use sign_guard::security::{is_valid_israeli_id, sanitize, secure_token};
//!
//! assert!(is_valid_israeli_id("123456782"));
//! assert_eq!(sanitize("<b>"), "&lt;b&gt;");
//! assert_eq!(secure_token(16).unwrap().len(), 32);
//! ```

pub mod codec;
pub mod csrf;
pub mod headers;
pub mod password;
pub mod rate_limit;
pub mod token;
pub mod validation;

// Re-export commonly used types
pub use codec::{Cipher, Codec, EncryptionKey, ObfuscationCipher};
pub use csrf::CsrfGuard;
pub use headers::{CONTENT_SECURITY_POLICY, CSP_HEADER};
pub use password::{PasswordHasher, Sha256Hasher};
pub use rate_limit::{DenyReason, RateDecision, RateLimitConfig, RateLimitStats, RateLimiter};
pub use token::{secure_token, TokenGenerator};
pub use validation::{
    is_allowed_file_type, is_valid_email, is_valid_israeli_id, is_valid_israeli_phone,
    is_within_size_limit, sanitize, sanitize_value, FileDescriptor, UploadPolicy,
};
