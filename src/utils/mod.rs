//! Utility functions and helpers.

pub mod console;
pub mod http;

use sha2::{Digest, Sha256};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Hex SHA-256 of a byte slice, truncated to `len` characters.
pub fn content_digest(bytes: &[u8], len: usize) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..len.min(digest.len())].to_string()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
