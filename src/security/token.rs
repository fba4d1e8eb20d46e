//! Random identifier and token generation.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::clock::Clock;
use crate::error::SecurityError;
use crate::Result;

/// Bytes of randomness in a document ID suffix.
const DOCUMENT_ID_BYTES: usize = 8;
/// Bytes of randomness in a signature link token.
const SIGNATURE_TOKEN_BYTES: usize = 64;

/// Fill a buffer from the operating system CSPRNG and render it as hex.
///
/// The returned string has `2 * length` lowercase hex characters. A failing
/// random source is reported as [`SecurityError::RandomSource`]; no weaker
/// generator is ever substituted.
pub fn secure_token(length: usize) -> Result<String> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SecurityError::RandomSource(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Generator for document IDs and signature tokens.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    clock: Arc<dyn Clock>,
}

impl TokenGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Random hex token of `length` bytes.
    pub fn secure_token(&self, length: usize) -> Result<String> {
        secure_token(length)
    }

    /// Document ID in the form `DOC-<unix millis>-<16 hex chars>`.
    pub fn document_id(&self) -> Result<String> {
        let random = secure_token(DOCUMENT_ID_BYTES)?;
        Ok(format!("DOC-{}-{}", self.clock.now_millis(), random))
    }

    /// Token embedded in signature links (128 hex chars).
    pub fn signature_token(&self) -> Result<String> {
        secure_token(SIGNATURE_TOKEN_BYTES)
    }
}
