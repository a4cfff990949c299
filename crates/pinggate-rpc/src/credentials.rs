//! Credential header translation between HTTP and gRPC metadata.
//!
//! The gateway offers every incoming HTTP header to
//! [`credential_header_matcher`]. Only names on [`HEADER_ALLOW_LIST`]
//! survive; they become call metadata under their lower-case name.
//! Any other header is dropped and never reaches the backend's
//! authentication context.

use axum::http::HeaderMap;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

/// HTTP header names the gateway may copy into call metadata.
pub const HEADER_ALLOW_LIST: [&str; 2] = ["Login", "Password"];

/// Returns the metadata name for `header_name`, or `None` to drop it.
///
/// Matching is exact and case-sensitive on the canonical header form.
/// An accepted name is returned unchanged.
pub fn credential_header_matcher(header_name: &str) -> Option<&str> {
    if HEADER_ALLOW_LIST.contains(&header_name) {
        Some(header_name)
    } else {
        None
    }
}

/// Canonical MIME form of a header name: `x-trace-id` → `X-Trace-Id`.
///
/// HTTP/1.1 stacks hand header names over lower-cased; the matcher
/// works on the canonical form the caller most likely typed.
pub fn canonical_header_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Builds outbound call metadata from the allow-listed request headers.
///
/// Every value of a repeated header is forwarded byte for byte, so a
/// credential the backend cannot match is still presented to it.
pub fn forward_credential_headers(headers: &HeaderMap) -> MetadataMap {
    let mut metadata = MetadataMap::new();

    for (name, value) in headers {
        let canonical = canonical_header_key(name.as_str());
        let Some(accepted) = credential_header_matcher(&canonical) else {
            continue;
        };

        let lower = accepted.to_ascii_lowercase();
        let key = match MetadataKey::<Ascii>::from_bytes(lower.as_bytes()) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(header = %canonical, %e, "cannot map header to metadata key");
                continue;
            }
        };

        let value = match MetadataValue::<Ascii>::try_from(value.as_bytes()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(header = %canonical, %e, "dropping unmappable credential header");
                continue;
            }
        };

        metadata.append(key, value);
    }

    metadata
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
