//! URL utilities for validating media URLs and deriving cache keys

use crate::error::ServiceError;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

/// Parse and validate a caller-supplied media URL
pub fn parse_media_url(raw: &str) -> Result<Url, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput("URL not provided".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ServiceError::InvalidInput(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ServiceError::InvalidInput("URL has no host".to_string()));
    }

    Ok(parsed)
}

/// Normalize a URL for cache lookups.
///
/// Scheme and host are already lowercased by the parser; the fragment never
/// reaches the server so it is dropped.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.to_string()
}

/// Derive the preview cache key for a URL.
///
/// This is a 64-bit non-cryptographic hash used only for in-process lookup.
/// It is not a security boundary.
pub fn cache_key(url: &Url) -> String {
    let mut hasher = DefaultHasher::new();
    normalize_url(url).hash(&mut hasher);
    format!("preview_{:016x}", hasher.finish())
}
