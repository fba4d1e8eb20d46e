//! Password digests.
//!
//! [`Sha256Hasher`] is a bare SHA-256 of the UTF-8 password: no salt, no
//! stretching. It exists for compatibility with stored digests. Callers go
//! through [`PasswordHasher`] so a salted KDF can replace it.

use sha2::{Digest, Sha256};

/// One-way password digest.
pub trait PasswordHasher: Send + Sync {
    /// Digest of `password`.
    fn hash(&self, password: &str) -> String;

    /// Whether `password` produces `digest`.
    fn verify(&self, password: &str, digest: &str) -> bool {
        self.hash(password) == digest
    }
}

/// Unsalted SHA-256, lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }
}
