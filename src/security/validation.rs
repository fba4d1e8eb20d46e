//! Input validation and sanitization.
//!
//! Every check here is a pure predicate: a failing input yields `false`,
//! never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[2-9][0-9]{7,8}$").expect("valid phone regex"));

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upload metadata as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// MIME type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// Check an address against `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Check an Israeli landline or mobile number.
///
/// Hyphens and whitespace are stripped before matching.
pub fn is_valid_israeli_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();
    PHONE_RE.is_match(&digits)
}

/// Check a 9-digit Israeli ID number against its check digit.
pub fn is_valid_israeli_id(id: &str) -> bool {
    if id.len() != 9 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = id
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let product = u32::from(b - b'0') * (i as u32 % 2 + 1);
            if product > 9 {
                product - 9
            } else {
                product
            }
        })
        .sum();

    sum % 10 == 0
}

/// Whether the file's MIME type is in `allowed`.
pub fn is_allowed_file_type<S: AsRef<str>>(file: &FileDescriptor, allowed: &[S]) -> bool {
    allowed.iter().any(|t| t.as_ref() == file.mime_type)
}

/// Whether the file is at most `max_mb` mebibytes.
pub fn is_within_size_limit(file: &FileDescriptor, max_mb: u64) -> bool {
    file.size_bytes <= max_mb.saturating_mul(BYTES_PER_MB)
}

/// HTML-escape `< > " ' /`, leaving everything else untouched.
///
/// Not idempotent: escaping an already escaped string escapes it again.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sanitize a JSON value. Strings are escaped; every other value is
/// returned unchanged.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize(&s)),
        other => other,
    }
}

/// Upload allow-list and size limit taken from configuration.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_types: Vec<String>,
    max_size_mb: u64,
}

impl UploadPolicy {
    pub fn new(allowed_types: Vec<String>, max_size_mb: u64) -> Self {
        Self {
            allowed_types,
            max_size_mb,
        }
    }

    /// Whether the file passes both the type and size checks.
    pub fn accepts(&self, file: &FileDescriptor) -> bool {
        self.is_allowed_type(file) && self.is_within_limit(file)
    }

    pub fn is_allowed_type(&self, file: &FileDescriptor) -> bool {
        is_allowed_file_type(file, &self.allowed_types)
    }

    pub fn is_within_limit(&self, file: &FileDescriptor) -> bool {
        is_within_size_limit(file, self.max_size_mb)
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(vec!["application/pdf".to_string()], 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.domain.co.il"));
        assert!(is_valid_email("a@b.c"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("user @example.com"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_valid_phones() {
        assert!(is_valid_israeli_phone("03-1234567"));
        assert!(is_valid_israeli_phone("050-123-4567"));
        assert!(is_valid_israeli_phone("054 765 4321"));
        assert!(is_valid_israeli_phone("0521234567"));
    }

    #[test]
    fn test_invalid_phones() {
        assert!(!is_valid_israeli_phone(""));
        assert!(!is_valid_israeli_phone("01-1234567")); // second digit must be 2-9
        assert!(!is_valid_israeli_phone("1234567890"));
        assert!(!is_valid_israeli_phone("050-12345")); // too short
        assert!(!is_valid_israeli_phone("050-12345678")); // too long
        assert!(!is_valid_israeli_phone("+972501234567"));
        assert!(!is_valid_israeli_phone("050-١٢٣٤٥٦٧")); // non-ASCII digits
    }

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_israeli_id("000000000"));
        assert!(is_valid_israeli_id("000000018"));
        assert!(is_valid_israeli_id("123456782"));
    }

    #[test]
    fn test_invalid_id_checksum() {
        assert!(!is_valid_israeli_id("123456789"));
        assert!(!is_valid_israeli_id("000000019"));
        // Sums to 17 under the alternating 1/2 weighting.
        assert!(!is_valid_israeli_id("305100171"));
    }

    #[test]
    fn test_invalid_id_shape() {
        assert!(!is_valid_israeli_id(""));
        assert!(!is_valid_israeli_id("12345678"));
        assert!(!is_valid_israeli_id("0000000000"));
        assert!(!is_valid_israeli_id("12345678a"));
        assert!(!is_valid_israeli_id("1234-5678"));
        assert!(!is_valid_israeli_id(" 12345678"));
    }

    #[test]
    fn test_file_type() {
        let pdf = FileDescriptor::new("application/pdf", 1024);
        let png = FileDescriptor::new("image/png", 1024);

        assert!(is_allowed_file_type(&pdf, &["application/pdf"]));
        assert!(!is_allowed_file_type(&png, &["application/pdf"]));
        assert!(is_allowed_file_type(&png, &["application/pdf", "image/png"]));
        assert!(!is_allowed_file_type::<&str>(&pdf, &[]));
    }

    #[test]
    fn test_file_size_boundary() {
        let exact = FileDescriptor::new("application/pdf", 50 * 1024 * 1024);
        let over = FileDescriptor::new("application/pdf", 50 * 1024 * 1024 + 1);

        assert!(is_within_size_limit(&exact, 50));
        assert!(!is_within_size_limit(&over, 50));
        assert!(is_within_size_limit(&FileDescriptor::new("x", 0), 0));
    }

    #[test]
    fn test_sanitize_script() {
        assert_eq!(sanitize("<script>"), "&lt;script&gt;");
        assert_eq!(
            sanitize(r#"<a href="/x">'hi'</a>"#),
            "&lt;a href=&quot;&#x2F;x&quot;&gt;&#x27;hi&#x27;&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn test_sanitize_untouched() {
        assert_eq!(sanitize("hello & goodbye"), "hello & goodbye");
        assert_eq!(sanitize("שלום עולם"), "שלום עולם");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_not_idempotent() {
        let once = sanitize("<");
        let twice = sanitize(&once);
        assert_eq!(once, "&lt;");
        assert_ne!(twice, once);
    }

    #[test]
    fn test_sanitize_value_passthrough() {
        assert_eq!(sanitize_value(json!(42)), json!(42));
        assert_eq!(sanitize_value(json!(null)), json!(null));
        assert_eq!(sanitize_value(json!(["<b>"])), json!(["<b>"]));
        assert_eq!(sanitize_value(json!("<b>")), json!("&lt;b&gt;"));
    }

    #[test]
    fn test_upload_policy() {
        let policy = UploadPolicy::default();
        assert!(policy.accepts(&FileDescriptor::new("application/pdf", 10)));
        assert!(!policy.accepts(&FileDescriptor::new("text/html", 10)));
        assert!(!policy.accepts(&FileDescriptor::new("application/pdf", 51 * 1024 * 1024)));
        assert_eq!(policy.max_size_mb(), 50);
        assert_eq!(policy.allowed_types(), ["application/pdf".to_string()]);
    }
}
