//! HTTP execution orchestration.
//!
//! Defaults and merges the request spec, resolves cookies through the
//! profile source, performs the transfer through the transport port, then
//! hands the effective request plus outcome to the logging pipeline. Logging
//! failures never fail the call; they surface in the envelope's notes.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use stg_domain::entities::HttpMethod;
use stg_domain::error::{Error, Result};
use stg_domain::ports::{CookieProfileSource, HttpTransport, TransferRequest};
use stg_domain::value_objects::MissionId;

use crate::logging_pipeline::RequestLogger;
use crate::mission_context::MissionContext;
use crate::redaction::{BodyLimits, truncate_body};

/// Credentials attached to an outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuthSpec {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// One outbound request as the agent specified it.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub auth: Option<AuthSpec>,
    pub body: Option<String>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub timeout_ms: u64,
    pub verify_tls: bool,
    pub proxy_url: Option<String>,
    /// Profile resolved through the cookie source; explicit `cookies`
    /// override profile entries by key
    pub cookie_profile: Option<String>,
    /// Per-call override of the active mission
    pub mission_id: Option<MissionId>,
}

impl RequestSpec {
    /// A GET request with spec defaults.
    #[must_use]
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            cookies: HashMap::new(),
            auth: None,
            body: None,
            follow_redirects: true,
            max_redirects: 10,
            timeout_ms: 30_000,
            verify_tls: true,
            proxy_url: None,
            cookie_profile: None,
            mission_id: None,
        }
    }
}

/// What the agent gets back from `http_request`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
    /// Possibly truncated at the configured response cap
    pub body: Option<String>,
    pub body_truncated: bool,
    pub elapsed_ms: u64,
    pub final_url: String,
    /// Set iff the transfer failed with no response
    pub error: Option<String>,
    /// Id of the persisted request row, when logging succeeded
    pub request_id: Option<String>,
    /// Structured side channel for logging-pipeline outcomes
    pub logging: Vec<String>,
}

/// The HTTP executor.
pub struct HttpExecutor {
    transport: Arc<dyn HttpTransport>,
    cookie_profiles: Option<Arc<dyn CookieProfileSource>>,
    logger: Arc<RequestLogger>,
    mission_context: Arc<MissionContext>,
    default_proxy: Option<String>,
    limits: BodyLimits,
}

impl HttpExecutor {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cookie_profiles: Option<Arc<dyn CookieProfileSource>>,
        logger: Arc<RequestLogger>,
        mission_context: Arc<MissionContext>,
        default_proxy: Option<String>,
        limits: BodyLimits,
    ) -> Self {
        Self {
            transport,
            cookie_profiles,
            logger,
            mission_context,
            default_proxy,
            limits,
        }
    }

    /// Execute one request and log it.
    ///
    /// # Errors
    ///
    /// Fails on cookie-profile errors (the agent asked for auth state the
    /// gateway cannot supply) and on transport-infrastructure errors such as
    /// an unparseable proxy URL. Wire failures do NOT fail the call; they
    /// come back inside the envelope with `error` set.
    pub async fn execute(&self, spec: RequestSpec) -> Result<ResponseEnvelope> {
        let mission_id = self.mission_context.resolve_mission(spec.mission_id);
        let cookies = self.resolve_cookies(&spec).await?;
        let headers = Self::apply_auth(spec.headers.clone(), spec.auth.as_ref());

        let request = TransferRequest {
            method: spec.method,
            url: spec.url.clone(),
            headers,
            query_params: spec.query_params.clone(),
            cookies,
            body: spec.body.as_ref().map(|b| b.as_bytes().to_vec()),
            follow_redirects: spec.follow_redirects,
            max_redirects: spec.max_redirects,
            timeout_ms: spec.timeout_ms,
            verify_tls: spec.verify_tls,
            proxy_url: spec.proxy_url.clone().or_else(|| self.default_proxy.clone()),
        };

        let outcome = self.transport.execute(&request).await?;
        let report = self.logger.record(&request, &outcome, mission_id).await;

        let body = (!outcome.body.is_empty())
            .then(|| truncate_body(&outcome.body, self.limits.max_response_bytes));

        Ok(ResponseEnvelope {
            status: outcome.status,
            headers: outcome.headers,
            body: body.as_ref().map(|b| b.text.clone()),
            body_truncated: body.as_ref().is_some_and(|b| b.truncated),
            elapsed_ms: outcome.elapsed_ms,
            final_url: outcome.final_url,
            error: outcome.failure.map(|f| f.message),
            request_id: report.request_id.map(|id| id.as_str()),
            logging: report.notes,
        })
    }

    /// Profile cookies first, explicit cookies override by key.
    async fn resolve_cookies(&self, spec: &RequestSpec) -> Result<HashMap<String, String>> {
        let profile_name = self
            .mission_context
            .resolve_cookie_profile(spec.cookie_profile.clone());
        let Some(profile_name) = profile_name else {
            return Ok(spec.cookies.clone());
        };

        let source = self.cookie_profiles.as_ref().ok_or_else(|| {
            Error::config(format!(
                "cookie profile '{profile_name}' requested but no profile source is configured"
            ))
        })?;
        let profile = source.get(&profile_name).await?;

        let mut merged = profile.cookies;
        for (name, value) in &spec.cookies {
            merged.insert(name.clone(), value.clone());
        }
        Ok(merged)
    }

    fn apply_auth(
        mut headers: HashMap<String, String>,
        auth: Option<&AuthSpec>,
    ) -> HashMap<String, String> {
        match auth {
            Some(AuthSpec::Basic { username, password }) => {
                let token = BASE64.encode(format!("{username}:{password}"));
                headers.insert("Authorization".to_owned(), format!("Basic {token}"));
            }
            Some(AuthSpec::Bearer { token }) => {
                headers.insert("Authorization".to_owned(), format!("Bearer {token}"));
            }
            None => {}
        }
        headers
    }
}
