//! Reversible at-rest encoding of structured values.
//!
//! The scheme implemented by [`ObfuscationCipher`] is base64 over
//! `<json>::<key prefix>`. It hides nothing from anyone who can run base64
//! and carries no integrity check beyond the separator count. It is kept
//! for compatibility with blobs already written in this format; a real
//! AEAD cipher can replace it by implementing [`Cipher`].

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::token::secure_token;
use crate::error::SecurityError;
use crate::Result;

/// Separator between the payload and the key prefix.
const SEPARATOR: &str = "::";
/// Number of key characters appended to every payload.
const KEY_PREFIX_LEN: usize = 16;
/// Bytes of randomness in a process encryption key.
const KEY_BYTES: usize = 32;

/// Process-lifetime secret, 32 random bytes rendered as hex.
///
/// Never persisted. Replacing it invalidates every previously encoded blob.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey(String);

impl EncryptionKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Result<Self> {
        Ok(Self(secure_token(KEY_BYTES)?))
    }

    /// Build a key from existing hex material.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    fn prefix(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(KEY_PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// String-to-string transform used by [`Codec`].
pub trait Cipher: Send + Sync {
    /// Transform serialized text into its at-rest form.
    fn seal(&self, plaintext: &str) -> Result<String>;

    /// Reverse [`Cipher::seal`], returning the serialized text.
    fn open(&self, sealed: &str) -> Result<String>;
}

/// Base64 obfuscation keyed by a prefix of the process key.
#[derive(Debug, Clone)]
pub struct ObfuscationCipher {
    key: EncryptionKey,
}

impl ObfuscationCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }
}

impl Cipher for ObfuscationCipher {
    fn seal(&self, plaintext: &str) -> Result<String> {
        let framed = format!("{plaintext}{SEPARATOR}{}", self.key.prefix());
        Ok(STANDARD.encode(framed.as_bytes()))
    }

    fn open(&self, sealed: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|e| SecurityError::Decoding(format!("invalid base64: {e}")))?;
        let framed = String::from_utf8(bytes)
            .map_err(|e| SecurityError::Decoding(format!("invalid UTF-8: {e}")))?;

        let parts: Vec<&str> = framed.split(SEPARATOR).collect();
        if parts.len() != 2 {
            return Err(SecurityError::Decoding(format!(
                "expected 2 segments, found {}",
                parts.len()
            )));
        }
        Ok(parts[0].to_string())
    }
}

/// Serializing front-end over a [`Cipher`].
pub struct Codec {
    cipher: Box<dyn Cipher>,
}

impl Codec {
    /// Codec over an arbitrary cipher.
    pub fn new(cipher: impl Cipher + 'static) -> Self {
        Self {
            cipher: Box::new(cipher),
        }
    }

    /// Codec using the obfuscation scheme with a freshly generated key.
    pub fn generate() -> Result<Self> {
        Ok(Self::new(ObfuscationCipher::new(EncryptionKey::generate()?)))
    }

    /// Serialize `value` to JSON and seal it.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json =
            serde_json::to_string(value).map_err(|e| SecurityError::Encoding(e.to_string()))?;
        self.cipher.seal(&json)
    }

    /// Open `encoded` and parse the payload as `T`.
    pub fn decode<T: DeserializeOwned>(&self, encoded: &str) -> Result<T> {
        let json = self.cipher.open(encoded)?;
        serde_json::from_str(&json).map_err(|e| SecurityError::Decoding(e.to_string()))
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn codec() -> Codec {
        Codec::new(ObfuscationCipher::new(EncryptionKey::from_hex(
            "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff",
        )))
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: String,
        count: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_roundtrip_struct() {
        let codec = codec();
        let value = Sample {
            id: "abc".into(),
            count: 7,
            tags: vec!["x".into(), "y".into()],
        };

        let encoded = codec.encode(&value).unwrap();
        let decoded: Sample = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_roundtrip_unicode() {
        let codec = codec();
        let value = json!({"name": "זרימה פלוס", "amount": 12.5});

        let decoded: Value = codec.decode(&codec.encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_encoded_format() {
        let codec = codec();
        let encoded = codec.encode(&json!({"a": 1})).unwrap();

        let raw = String::from_utf8(STANDARD.decode(&encoded).unwrap()).unwrap();
        assert_eq!(raw, r#"{"a":1}::0011223344556677"#);
    }

    #[test]
    fn test_decode_garbage() {
        let codec = codec();
        let result = codec.decode::<Value>("not-a-valid-encoded-string");
        assert!(matches!(result, Err(SecurityError::Decoding(_))));
    }

    #[test]
    fn test_decode_missing_separator() {
        let codec = codec();
        let encoded = STANDARD.encode(r#"{"a":1}"#);
        assert!(matches!(
            codec.decode::<Value>(&encoded),
            Err(SecurityError::Decoding(_))
        ));
    }

    #[test]
    fn test_decode_extra_separator() {
        let codec = codec();
        let encoded = STANDARD.encode(r#"{"a":1}::x::y"#);
        assert!(matches!(
            codec.decode::<Value>(&encoded),
            Err(SecurityError::Decoding(_))
        ));
    }

    #[test]
    fn test_payload_containing_separator_cannot_be_decoded() {
        let codec = codec();
        let encoded = codec.encode(&json!({"note": "a::b"})).unwrap();
        assert!(codec.decode::<Value>(&encoded).is_err());
    }

    #[test]
    fn test_decode_invalid_json_half() {
        let codec = codec();
        let encoded = STANDARD.encode("{broken::0011223344556677");
        assert!(matches!(
            codec.decode::<Value>(&encoded),
            Err(SecurityError::Decoding(_))
        ));
    }

    #[test]
    fn test_key_is_not_checked_on_decode() {
        let a = codec();
        let b = Codec::generate().unwrap();
        let encoded = a.encode(&json!([1, 2, 3])).unwrap();

        let decoded: Value = b.decode(&encoded).unwrap();
        assert_eq!(decoded, json!([1, 2, 3]));
    }

    #[test]
    fn test_encode_non_string_map_keys_fails() {
        let codec = codec();
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1u8);
        assert!(matches!(
            codec.encode(&map),
            Err(SecurityError::Encoding(_))
        ));
    }

    #[test]
    fn test_generated_key_is_64_hex() {
        let key = EncryptionKey::generate().unwrap();
        assert_eq!(key.0.len(), 64);
        assert_eq!(key.prefix().len(), 16);
        assert_eq!(format!("{:?}", key), "EncryptionKey(<redacted>)");
    }
}
