//! Error types for sign-guard.

use thiserror::Error;

/// Main error type for sign-guard operations.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// A value could not be serialized for at-rest storage.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// An encoded blob was malformed or failed to parse.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The backing key-value store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The operating system random source failed.
    #[error("secure random source unavailable: {0}")]
    RandomSource(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for sign-guard operations.
pub type Result<T> = std::result::Result<T, SecurityError>;
