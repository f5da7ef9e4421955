//! Persisted HTTP request/response records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ActionId, RequestId, TargetId};

/// HTTP methods the executor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl_from_str!(HttpMethod, "Unknown HTTP method: {}", {
    "get" => HttpMethod::Get,
    "post" => HttpMethod::Post,
    "put" => HttpMethod::Put,
    "patch" => HttpMethod::Patch,
    "delete" => HttpMethod::Delete,
    "head" => HttpMethod::Head,
    "options" => HttpMethod::Options,
});

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one executed HTTP request.
///
/// Bodies are stored truncated at the configured caps with the original byte
/// sizes preserved; headers arrive already redacted. Deleting the linked
/// target or action nulls the back-reference but keeps the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequestRecord {
    pub id: RequestId,
    pub method: HttpMethod,
    /// Full URL as requested
    pub url: String,
    /// URL after redirects; target attribution follows this, not `url`
    pub final_url: String,
    /// Host component of the final URL, when parseable
    pub host: Option<String>,
    pub path: Option<String>,
    pub query_params: HashMap<String, String>,
    pub request_headers: HashMap<String, String>,
    /// Cookies are the test payload and are stored unredacted unless the
    /// redaction set lists them explicitly
    pub request_cookies: HashMap<String, String>,
    pub request_body: Option<String>,
    /// Original request body size in bytes, before truncation
    pub request_body_size: Option<i64>,
    /// Absent when the transfer failed with no response
    pub status_code: Option<i32>,
    pub response_headers: HashMap<String, String>,
    pub response_body: Option<String>,
    /// Original response body size in bytes, before truncation
    pub response_body_size: Option<i64>,
    pub elapsed_ms: Option<i64>,
    /// Set iff the transfer failed with no response
    pub error: Option<String>,
    pub target_id: Option<TargetId>,
    pub action_id: Option<ActionId>,
    pub created_at: DateTime<Utc>,
}
