//! Sensitive-header redaction and body truncation.

use std::collections::{HashMap, HashSet};

/// Replacement written over redacted header values.
pub const REDACTED: &str = "[REDACTED]";

/// One mebibyte, the default stored-body cap per direction.
pub const DEFAULT_BODY_CAP: usize = 1024 * 1024;

/// Case-insensitive set of header names whose values are replaced with
/// [`REDACTED`] before persistence. Applies to request and response headers;
/// cookies stay unredacted unless listed explicitly.
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    sensitive: HashSet<String>,
}

impl RedactionPolicy {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sensitive: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether the named header would be redacted.
    #[must_use]
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive.contains(&name.to_lowercase())
    }

    /// Copy of the map with sensitive values replaced.
    #[must_use]
    pub fn redact(&self, headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                if self.is_sensitive(name) {
                    (name.clone(), REDACTED.to_owned())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(["authorization", "proxy-authorization"])
    }
}

/// Stored-body caps in bytes, per direction.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_request_bytes: usize,
    pub max_response_bytes: usize,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_BODY_CAP,
            max_response_bytes: DEFAULT_BODY_CAP,
        }
    }
}

/// A body prepared for storage: UTF-8 (lossy) text cut at the byte cap, with
/// the original size preserved.
#[derive(Debug, Clone)]
pub struct TruncatedBody {
    pub text: String,
    pub original_size: i64,
    pub truncated: bool,
}

/// Cut `bytes` at `cap` bytes and render as lossy UTF-8.
#[must_use]
pub fn truncate_body(bytes: &[u8], cap: usize) -> TruncatedBody {
    let truncated = bytes.len() > cap;
    let kept = if truncated { &bytes[..cap] } else { bytes };
    TruncatedBody {
        text: String::from_utf8_lossy(kept).into_owned(),
        original_size: bytes.len() as i64,
        truncated,
    }
}
