//! Tool request parameters.
//!
//! Scalars that agents habitually pass as strings are typed as raw JSON
//! values here and coerced in one pass by the router, so a single response
//! can enumerate every offending field.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// `http_request` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HttpRequestParams {
    /// Absolute URL to request
    pub url: String,
    /// HTTP method: GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS (default GET)
    pub method: Option<String>,
    /// Request headers: object or JSON object text
    pub headers: Option<Value>,
    /// Query parameters appended to the URL: object or JSON object text
    pub query_params: Option<Value>,
    /// Cookies sent with the request: object or JSON object text; entries
    /// override the cookie profile by key
    pub cookies: Option<Value>,
    /// Authentication: `{"type":"basic","username":..,"password":..}` or
    /// `{"type":"bearer","token":..}`; object or JSON text
    pub auth: Option<Value>,
    /// Request body text
    pub body: Option<String>,
    /// Follow redirects (default true); boolean or common string spelling
    pub follow_redirects: Option<Value>,
    /// Redirect cap (default 10); integer or decimal string
    pub max_redirects: Option<Value>,
    /// Timeout in milliseconds (default 30000); integer or decimal string
    pub timeout_ms: Option<Value>,
    /// Verify TLS certificates (default true); boolean or string spelling
    pub verify_tls: Option<Value>,
    /// Per-call upstream proxy URL
    pub proxy_url: Option<String>,
    /// Named cookie profile supplying authentication cookies
    pub cookie_profile: Option<String>,
    /// Mission UUID overriding the active mission for this call
    pub mission_id: Option<String>,
}

/// `create_target` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTargetParams {
    /// Hostname (lowercased on store)
    pub host: String,
    /// Port; omitted or scheme-default ports are normalised away
    pub port: Option<Value>,
    /// http or https (default https)
    pub protocol: Option<String>,
    /// Human-readable title
    pub title: Option<String>,
    /// active, inactive, blocked or completed (default active)
    pub status: Option<String>,
    /// low, medium, high or critical (default medium)
    pub risk_level: Option<String>,
    /// Free-form notes stored in target metadata
    pub notes: Option<String>,
}

/// `update_target_status` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTargetStatusParams {
    /// Target UUID
    pub target_id: String,
    /// New status: active, inactive, blocked or completed
    pub status: Option<String>,
    /// New risk level: low, medium, high or critical
    pub risk_level: Option<String>,
    /// Notes merged into target metadata
    pub notes: Option<String>,
}

/// `get_target_summary` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTargetSummaryParams {
    /// Target UUID
    pub target_id: String,
}

/// `search_targets` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchTargetsParams {
    /// Case-insensitive substring matched on host and title
    pub query: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Filter by risk level
    pub risk_level: Option<String>,
    /// Filter by protocol
    pub protocol: Option<String>,
    /// Result cap (default 50); integer or decimal string
    pub limit: Option<Value>,
}

/// `get_target_context` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTargetContextParams {
    /// Target UUID
    pub target_id: String,
    /// Specific version instead of the current one; integer or decimal string
    pub version: Option<Value>,
    /// Include the version history (default false)
    pub include_history: Option<Value>,
}

/// `update_target_context` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTargetContextParams {
    /// Target UUID
    pub target_id: String,
    /// Human-authored notes; at least one of the two context fields required
    pub user_context: Option<String>,
    /// Agent-authored notes
    pub agent_context: Option<String>,
    /// Short description of the change
    pub change_summary: Option<String>,
    /// Append onto the previous version (default true) instead of replacing
    pub append_mode: Option<Value>,
}

/// `create_mission` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateMissionParams {
    /// Short mission name
    pub name: String,
    /// Goal text; embedded for similarity search
    pub goal: String,
    /// Optional hypothesis; embedded when present
    pub hypothesis: Option<String>,
    /// Scope: `{"in_scope": [..], "out_of_scope": [..]}`; object or JSON text
    pub scope: Option<Value>,
}

/// `update_mission` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateMissionParams {
    /// Mission UUID
    pub mission_id: String,
    pub name: Option<String>,
    pub goal: Option<String>,
    pub hypothesis: Option<String>,
    /// active, paused, completed or failed; transitions are forward-only
    pub status: Option<String>,
}

/// `list_missions` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListMissionsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Result cap (default 50); integer or decimal string
    pub limit: Option<Value>,
}

/// `set_mission_context` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetMissionContextParams {
    /// Mission UUID to activate for this connection
    pub mission_id: String,
    /// Cookie profile applied to subsequent requests
    pub cookie_profile: Option<String>,
}

/// `get_mission_context` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMissionContextParams {
    /// Focus text; adds a similarity search over the mission's actions
    pub focus: Option<String>,
}

/// `record_action` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecordActionParams {
    /// Short technique label; stats group by the exact text
    pub technique: String,
    /// Observed result text
    pub result: String,
    /// true, false or unknown; boolean or string spelling
    pub success: Value,
    /// Hypothesis tested by this attempt
    pub hypothesis: Option<String>,
    /// Durable learning worth keeping
    pub learning: Option<String>,
    /// Mission UUID overriding the active mission
    pub mission_id: Option<String>,
    /// How many recent mission requests to link to the action (default 3)
    pub link_recent_requests: Option<Value>,
}

/// `find_similar_techniques` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindSimilarTechniquesParams {
    /// Query text embedded and searched against action embeddings
    pub query: String,
    /// Result cap (default 10); integer or decimal string
    pub k: Option<Value>,
    /// Similarity floor in [0,1] (default 0.5); number or string
    pub min_similarity: Option<Value>,
    /// Restrict to one mission
    pub mission_id: Option<String>,
}

/// `search_techniques` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchTechniquesParams {
    /// Only successful actions; boolean or string spelling
    pub success_only: Option<Value>,
    /// Restrict to missions currently in this status
    pub mission_type: Option<String>,
    /// Per-technique success-rate floor in [0,1]; number or string
    pub min_success_rate: Option<Value>,
    /// Case-insensitive substring over technique labels
    pub technique_substring: Option<String>,
    /// Result cap (default 50); integer or decimal string
    pub limit: Option<Value>,
}

/// `get_technique_stats` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTechniqueStatsParams {
    /// Exact technique label
    pub technique: String,
}

/// `add_to_library` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddToLibraryParams {
    pub title: String,
    /// Content text; embedded and guarded against near-duplicates
    pub content: String,
    pub category: String,
    /// Tags: list or JSON array text
    pub tags: Option<Value>,
    /// Free-form metadata: object or JSON object text
    pub metadata: Option<Value>,
}

/// `search_library` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchLibraryParams {
    /// Query text embedded and searched against entry content
    pub query: String,
    /// Result cap (default 10); integer or decimal string
    pub k: Option<Value>,
    /// Similarity floor in [0,1] (default 0.5); number or string
    pub min_similarity: Option<Value>,
    /// Restrict to one category
    pub category: Option<String>,
}

/// `get_http_request` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetHttpRequestParams {
    /// Request UUID
    pub request_id: String,
}

/// `list_http_requests` parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListHttpRequestsParams {
    /// Filter by target UUID
    pub target_id: Option<String>,
    /// Filter by exact host
    pub host: Option<String>,
    /// Result cap (default 50); integer or decimal string
    pub limit: Option<Value>,
}
