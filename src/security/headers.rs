//! Security response headers.

/// Content-Security-Policy applied to every served page.
///
/// Allows the app's own origin plus the jsDelivr/cdnjs script CDNs and
/// Google Fonts.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
script-src 'self' 'unsafe-inline' 'unsafe-eval' https://cdn.jsdelivr.net https://cdnjs.cloudflare.com; \
style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
font-src 'self' https://fonts.gstatic.com; \
img-src 'self' data: blob:;";

/// Header name the policy is sent under.
pub const CSP_HEADER: &str = "Content-Security-Policy";
