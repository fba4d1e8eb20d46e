//! CSRF token issue and verification.

use std::sync::Arc;

use tracing::warn;

use super::token::secure_token;
use crate::storage::{KeyValueStore, CSRF_SLOT};
use crate::Result;

/// Bytes of randomness in a CSRF token.
const CSRF_TOKEN_BYTES: usize = 32;

/// Issues a per-session CSRF token and checks candidates against it.
pub struct CsrfGuard {
    storage: Arc<dyn KeyValueStore>,
}

impl CsrfGuard {
    /// Guard storing its token in the session-scoped `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Generate a new token, replacing the previous one.
    pub fn issue(&self) -> Result<String> {
        let token = secure_token(CSRF_TOKEN_BYTES)?;
        if let Err(e) = self.storage.set(CSRF_SLOT, &token) {
            warn!(error = %e, "failed to store CSRF token");
        }
        Ok(token)
    }

    /// Whether `candidate` equals the stored token exactly.
    ///
    /// Without a stored token nothing verifies.
    pub fn verify(&self, candidate: &str) -> bool {
        match self.storage.get(CSRF_SLOT) {
            Ok(Some(stored)) => stored == candidate,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to read CSRF token");
                false
            }
        }
    }
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn guard() -> (CsrfGuard, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CsrfGuard::new(store.clone()), store)
    }

    #[test]
    fn test_issue_and_verify() {
        let (guard, store) = guard();
        let token = guard.issue().unwrap();

        assert_eq!(token.len(), 64);
        assert_eq!(store.get(CSRF_SLOT).unwrap(), Some(token.clone()));
        assert!(guard.verify(&token));
    }

    #[test]
    fn test_verify_rejects_other_strings() {
        let (guard, _) = guard();
        let token = guard.issue().unwrap();

        assert!(!guard.verify(""));
        assert!(!guard.verify("forged"));
        assert!(!guard.verify(&token.to_uppercase()));
        assert!(!guard.verify(&token[..63]));
    }

    #[test]
    fn test_verify_without_token() {
        let (guard, _) = guard();
        assert!(!guard.verify(""));
        assert!(!guard.verify("anything"));
    }

    #[test]
    fn test_reissue_invalidates_previous() {
        let (guard, _) = guard();
        let first = guard.issue().unwrap();
        let second = guard.issue().unwrap();

        assert!(!guard.verify(&first));
        assert!(guard.verify(&second));
    }
}
