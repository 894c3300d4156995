//! OpenAPI template substitution and document encoding.
//!
//! The template carries literal `${cloud_run_url}` placeholder tokens.
//! Substitution is an exact-match global replace of that token with the
//! resolved backend URI; every other byte passes through unchanged. The
//! encoding is plain base64 and therefore stable: the same template and URI
//! always produce the same encoded bytes, so an unrelated redeploy never
//! churns the API config.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// The placeholder token, matched literally (not as a pattern).
pub const URL_PLACEHOLDER: &str = "${cloud_run_url}";

/// Replace every occurrence of [`URL_PLACEHOLDER`] with `url`.
pub fn substitute(document: &str, url: &str) -> String {
    document.replace(URL_PLACEHOLDER, url)
}

/// An OpenAPI document ready to be attached to an API config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    /// Document file name as reported to the provider.
    pub path: String,
    /// Base64-encoded contents.
    pub contents: String,
}

impl EncodedDocument {
    pub fn new(path: &str, substituted: &str) -> Self {
        EncodedDocument {
            path: path.to_string(),
            contents: STANDARD.encode(substituted.as_bytes()),
        }
    }
}
