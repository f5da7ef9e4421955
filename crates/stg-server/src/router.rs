//! Tool implementations.
//!
//! Every tool coerces its parameters in one pass (collecting all field
//! errors), delegates to a service, and answers with the uniform envelope.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData, tool, tool_router};
use serde_json::json;

use stg_application::RequestSpec;
use stg_domain::entities::{
    ActionOutcome, ContextAuthor, HttpMethod, MissionStatus, RiskLevel, TargetStatus,
};
use stg_domain::ports::{ActionSearch, RequestRepository, RequestSearch, TargetSearch};
use stg_domain::value_objects::{MissionId, Protocol, RequestId, TargetId};

use crate::coerce::{self, FieldErrors};
use crate::requests::*;
use crate::responses::{ToolEnvelope, respond};
use crate::server::GatewayServer;

const DEFAULT_LIMIT: usize = 50;
const DEFAULT_K: usize = 10;
const DEFAULT_MIN_SIMILARITY: f32 = 0.5;
const DEFAULT_LINK_RECENT: usize = 3;

fn parse_request_spec(
    params: HttpRequestParams,
    default_timeout_ms: u64,
) -> stg_domain::error::Result<RequestSpec> {
    let mut errs = FieldErrors::new();
    let mut spec = RequestSpec::new(params.url);
    spec.timeout_ms = default_timeout_ms;

    if let Some(method) = coerce::opt_enum::<HttpMethod>(&mut errs, "method", params.method.as_deref())
    {
        spec.method = method;
    }
    spec.headers = coerce::string_map_or_default(&mut errs, "headers", params.headers.as_ref());
    spec.query_params =
        coerce::string_map_or_default(&mut errs, "query_params", params.query_params.as_ref());
    spec.cookies = coerce::string_map_or_default(&mut errs, "cookies", params.cookies.as_ref());
    spec.auth = coerce::opt_auth(&mut errs, "auth", params.auth.as_ref());
    spec.body = params.body;
    spec.follow_redirects = coerce::bool_or(
        &mut errs,
        "follow_redirects",
        params.follow_redirects.as_ref(),
        true,
    );
    spec.max_redirects =
        coerce::usize_or(&mut errs, "max_redirects", params.max_redirects.as_ref(), 10);
    if let Some(timeout) = coerce::opt_u64(&mut errs, "timeout_ms", params.timeout_ms.as_ref()) {
        spec.timeout_ms = timeout;
    }
    spec.verify_tls = coerce::bool_or(&mut errs, "verify_tls", params.verify_tls.as_ref(), true);
    spec.proxy_url = params.proxy_url;
    spec.cookie_profile = params.cookie_profile;
    spec.mission_id =
        coerce::opt_id::<MissionId>(&mut errs, "mission_id", params.mission_id.as_deref());

    errs.finish()?;
    Ok(spec)
}

#[tool_router(router = tool_router, vis = "pub(crate)")]
impl GatewayServer {
    #[tool(
        description = "Execute an HTTP request through the gateway. The request and its \
                       response are persisted, the target is auto-created from the final \
                       URL, and an active mission links the request to its latest action. \
                       Booleans and integers accept string spellings; maps accept JSON text."
    )]
    async fn http_request(
        &self,
        Parameters(params): Parameters<HttpRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let spec = match parse_request_spec(params, self.default_timeout_ms) {
            Ok(spec) => spec,
            Err(e) => return ToolEnvelope::failure(&e).render(),
        };
        let note = match spec.mission_id {
            Some(id) => Some(format!("Logged to mission {id}")),
            None => self.mission_note(),
        };
        respond(self.executor.execute(spec).await, note)
    }

    #[tool(
        description = "Register a target explicitly. The (host, port, protocol) triple is \
                       normalised: hosts lowercase, scheme-default ports dropped. Returns \
                       the existing target unchanged when the triple is already known."
    )]
    async fn create_target(
        &self,
        Parameters(params): Parameters<CreateTargetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let port = coerce::opt_u16(&mut errs, "port", params.port.as_ref());
        let protocol = coerce::enum_or(
            &mut errs,
            "protocol",
            params.protocol.as_deref(),
            Protocol::Https,
        );
        let status = coerce::enum_or(
            &mut errs,
            "status",
            params.status.as_deref(),
            TargetStatus::Active,
        );
        let risk_level = coerce::enum_or(
            &mut errs,
            "risk_level",
            params.risk_level.as_deref(),
            RiskLevel::Medium,
        );
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }

        let outcome = self
            .targets
            .create(
                &params.host,
                port,
                protocol,
                params.title,
                status,
                risk_level,
                params.notes,
            )
            .await
            .map(|(target, created)| json!({ "target": target, "created": created }));
        respond(outcome, None)
    }

    #[tool(
        description = "Update a target's status, risk level, or notes. Status follows the \
                       target state machine: active and inactive flip freely and may enter \
                       blocked or completed; blocked/completed recover only to active."
    )]
    async fn update_target_status(
        &self,
        Parameters(params): Parameters<UpdateTargetStatusParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let target_id = coerce::require_id::<TargetId>(&mut errs, "target_id", &params.target_id);
        let status = coerce::opt_enum::<TargetStatus>(&mut errs, "status", params.status.as_deref());
        let risk_level =
            coerce::opt_enum::<RiskLevel>(&mut errs, "risk_level", params.risk_level.as_deref());
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(target_id) = target_id else {
            unreachable!("target_id errors are caught by finish()");
        };

        respond(
            self.targets
                .update_status(&target_id, status, risk_level, params.notes)
                .await,
            None,
        )
    }

    #[tool(
        description = "Target overview: the row itself, request count, last activity, and \
                       an excerpt of the current context."
    )]
    async fn get_target_summary(
        &self,
        Parameters(params): Parameters<GetTargetSummaryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let target_id = coerce::require_id::<TargetId>(&mut errs, "target_id", &params.target_id);
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(target_id) = target_id else {
            unreachable!("target_id errors are caught by finish()");
        };
        respond(self.targets.summary(&target_id).await, None)
    }

    #[tool(
        description = "Search targets by case-insensitive substring over host and title, \
                       optionally filtered by status, risk level, or protocol. Sorted by \
                       recent activity."
    )]
    async fn search_targets(
        &self,
        Parameters(params): Parameters<SearchTargetsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let filter = TargetSearch {
            query: params.query,
            status: coerce::opt_enum(&mut errs, "status", params.status.as_deref()),
            risk_level: coerce::opt_enum(&mut errs, "risk_level", params.risk_level.as_deref()),
            protocol: coerce::opt_enum(&mut errs, "protocol", params.protocol.as_deref()),
            limit: coerce::usize_or(&mut errs, "limit", params.limit.as_ref(), DEFAULT_LIMIT),
        };
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(self.targets.search(&filter).await, None)
    }

    #[tool(
        description = "Read a target's context: the current version, a specific version, \
                       and optionally the whole history."
    )]
    async fn get_target_context(
        &self,
        Parameters(params): Parameters<GetTargetContextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let target_id = coerce::require_id::<TargetId>(&mut errs, "target_id", &params.target_id);
        let version = coerce::opt_i32(&mut errs, "version", params.version.as_ref());
        let include_history = coerce::bool_or(
            &mut errs,
            "include_history",
            params.include_history.as_ref(),
            false,
        );
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(target_id) = target_id else {
            unreachable!("target_id errors are caught by finish()");
        };
        respond(
            self.contexts.get(&target_id, version, include_history).await,
            None,
        )
    }

    #[tool(
        description = "Append a new context version for a target. Either user_context or \
                       agent_context is required. append_mode=true (default) concatenates \
                       onto the previous version; false replaces provided fields. Versions \
                       are immutable; concurrent writers get a conflict and should retry."
    )]
    async fn update_target_context(
        &self,
        Parameters(params): Parameters<UpdateTargetContextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let target_id = coerce::require_id::<TargetId>(&mut errs, "target_id", &params.target_id);
        let append_mode =
            coerce::bool_or(&mut errs, "append_mode", params.append_mode.as_ref(), true);
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(target_id) = target_id else {
            unreachable!("target_id errors are caught by finish()");
        };

        respond(
            self.contexts
                .update(
                    &target_id,
                    params.user_context,
                    params.agent_context,
                    params.change_summary,
                    append_mode,
                    ContextAuthor::Agent,
                )
                .await,
            None,
        )
    }

    #[tool(description = "Create a mission: a bounded engagement with a goal and scope.")]
    async fn create_mission(
        &self,
        Parameters(params): Parameters<CreateMissionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let scope = coerce::scope_or_default(&mut errs, "scope", params.scope.as_ref());
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(
            self.missions
                .create(params.name, params.goal, params.hypothesis, scope)
                .await,
            None,
        )
    }

    #[tool(
        description = "Update mission fields or move its status. Transitions are forward \
                       only: active and paused flip freely, completed/failed are terminal."
    )]
    async fn update_mission(
        &self,
        Parameters(params): Parameters<UpdateMissionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let mission_id =
            coerce::require_id::<MissionId>(&mut errs, "mission_id", &params.mission_id);
        let status =
            coerce::opt_enum::<MissionStatus>(&mut errs, "status", params.status.as_deref());
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(mission_id) = mission_id else {
            unreachable!("mission_id errors are caught by finish()");
        };
        respond(
            self.missions
                .update(&mission_id, params.name, params.goal, params.hypothesis, status)
                .await,
            None,
        )
    }

    #[tool(description = "List missions, optionally filtered by status.")]
    async fn list_missions(
        &self,
        Parameters(params): Parameters<ListMissionsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let status =
            coerce::opt_enum::<MissionStatus>(&mut errs, "status", params.status.as_deref());
        let limit = coerce::usize_or(&mut errs, "limit", params.limit.as_ref(), DEFAULT_LIMIT);
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(self.missions.list(status, limit).await, None)
    }

    #[tool(
        description = "Make a mission this connection's active mission; subsequent requests \
                       and actions attach to it. Optionally set the active cookie profile."
    )]
    async fn set_mission_context(
        &self,
        Parameters(params): Parameters<SetMissionContextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let mission_id =
            coerce::require_id::<MissionId>(&mut errs, "mission_id", &params.mission_id);
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(mission_id) = mission_id else {
            unreachable!("mission_id errors are caught by finish()");
        };

        let outcome = self
            .missions
            .set_context(&mission_id, params.cookie_profile)
            .await
            .map(|mission| {
                json!({
                    "active_mission_id": mission.id,
                    "active_mission_name": mission.name,
                })
            });
        respond(outcome, self.mission_note())
    }

    #[tool(description = "Clear this connection's active mission and cookie profile.")]
    async fn clear_mission_context(&self) -> Result<CallToolResult, ErrorData> {
        self.missions.clear_context();
        respond(Ok(json!({ "cleared": true })), None)
    }

    #[tool(
        description = "Show the active mission with its recent actions. A focus text adds \
                       a similarity search over the mission's recorded actions."
    )]
    async fn get_mission_context(
        &self,
        Parameters(params): Parameters<GetMissionContextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let info = match self.missions.context_info().await {
            Ok(info) => info,
            Err(e) => return ToolEnvelope::failure(&e).render(),
        };
        if info.active_mission_id.is_none() {
            return respond(Ok(json!({ "context": info })), None);
        }
        let outcome = self
            .missions
            .overview(params.focus.as_deref())
            .await
            .map(|overview| json!({ "context": info, "mission": overview }));
        respond(outcome, self.mission_note())
    }

    #[tool(
        description = "Record one technique attempt against the active (or given) mission. \
                       success accepts true/false/unknown. The mission's most recent \
                       requests are linked to the new action."
    )]
    async fn record_action(
        &self,
        Parameters(params): Parameters<RecordActionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let outcome = coerce::outcome(&mut errs, "success", &params.success)
            .unwrap_or(ActionOutcome::Unknown);
        let mission_id =
            coerce::opt_id::<MissionId>(&mut errs, "mission_id", params.mission_id.as_deref());
        let window = coerce::usize_or(
            &mut errs,
            "link_recent_requests",
            params.link_recent_requests.as_ref(),
            DEFAULT_LINK_RECENT,
        );
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }

        let result = self
            .missions
            .record_action(
                params.technique,
                params.result,
                outcome,
                params.hypothesis,
                params.learning,
                mission_id,
                window,
            )
            .await
            .map(|(action, linked)| {
                json!({
                    "action_id": action.id,
                    "technique": action.technique,
                    "linked_requests": linked,
                })
            });
        respond(result, self.mission_note())
    }

    #[tool(
        description = "Cosine-similarity search over recorded actions, optionally scoped \
                       to one mission. Scores are 1 - cosine distance, descending."
    )]
    async fn find_similar_techniques(
        &self,
        Parameters(params): Parameters<FindSimilarTechniquesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let k = coerce::usize_or(&mut errs, "k", params.k.as_ref(), DEFAULT_K);
        let min_similarity = coerce::f32_or(
            &mut errs,
            "min_similarity",
            params.min_similarity.as_ref(),
            DEFAULT_MIN_SIMILARITY,
        );
        let mission_id =
            coerce::opt_id::<MissionId>(&mut errs, "mission_id", params.mission_id.as_deref());
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(
            self.missions
                .find_similar_actions(&params.query, k, min_similarity, mission_id)
                .await,
            None,
        )
    }

    #[tool(
        description = "Structured action search: filter by success, mission status, or a \
                       technique substring, with an optional per-technique success-rate \
                       floor."
    )]
    async fn search_techniques(
        &self,
        Parameters(params): Parameters<SearchTechniquesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let filter = ActionSearch {
            mission_id: None,
            mission_status: coerce::opt_enum(&mut errs, "mission_type", params.mission_type.as_deref()),
            technique_substring: params.technique_substring,
            technique_exact: None,
            success_only: coerce::bool_or(&mut errs, "success_only", params.success_only.as_ref(), false),
            limit: coerce::usize_or(&mut errs, "limit", params.limit.as_ref(), DEFAULT_LIMIT),
        };
        let min_success_rate =
            coerce::opt_f32(&mut errs, "min_success_rate", params.min_success_rate.as_ref());
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(
            self.missions.search_techniques(filter, min_success_rate).await,
            None,
        )
    }

    #[tool(
        description = "Aggregate statistics for one exact technique label: usage count, \
                       success rate, failed contexts, last use."
    )]
    async fn get_technique_stats(
        &self,
        Parameters(params): Parameters<GetTechniqueStatsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(self.missions.technique_stats(&params.technique).await, None)
    }

    #[tool(
        description = "Add a curated technique to the library. Rejected as duplicate when \
                       an existing entry's content is at least 0.9 similar."
    )]
    async fn add_to_library(
        &self,
        Parameters(params): Parameters<AddToLibraryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let tags = coerce::opt_string_list(&mut errs, "tags", params.tags.as_ref()).unwrap_or_default();
        let metadata =
            coerce::opt_value_map(&mut errs, "metadata", params.metadata.as_ref()).unwrap_or_default();
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(
            self.library
                .add(params.title, params.content, params.category, tags, metadata)
                .await,
            None,
        )
    }

    #[tool(
        description = "Cosine-similarity search over library entries; retrieval bumps \
                       their usage statistics."
    )]
    async fn search_library(
        &self,
        Parameters(params): Parameters<SearchLibraryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let k = coerce::usize_or(&mut errs, "k", params.k.as_ref(), DEFAULT_K);
        let min_similarity = coerce::f32_or(
            &mut errs,
            "min_similarity",
            params.min_similarity.as_ref(),
            DEFAULT_MIN_SIMILARITY,
        );
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(
            self.library
                .search(&params.query, k, min_similarity, params.category.as_deref())
                .await,
            None,
        )
    }

    #[tool(description = "Library statistics: entry count, per-category counts, top tags.")]
    async fn get_library_stats(&self) -> Result<CallToolResult, ErrorData> {
        respond(self.library.stats().await, None)
    }

    #[tool(description = "Fetch one persisted HTTP request by id.")]
    async fn get_http_request(
        &self,
        Parameters(params): Parameters<GetHttpRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let request_id =
            coerce::require_id::<RequestId>(&mut errs, "request_id", &params.request_id);
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        let Some(request_id) = request_id else {
            unreachable!("request_id errors are caught by finish()");
        };
        respond(self.request_by_id(&request_id).await, None)
    }

    #[tool(
        description = "List persisted HTTP requests, newest first, optionally filtered by \
                       target or host."
    )]
    async fn list_http_requests(
        &self,
        Parameters(params): Parameters<ListHttpRequestsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut errs = FieldErrors::new();
        let filter = RequestSearch {
            target_id: coerce::opt_id(&mut errs, "target_id", params.target_id.as_deref()),
            host: params.host,
            limit: coerce::usize_or(&mut errs, "limit", params.limit.as_ref(), DEFAULT_LIMIT),
        };
        if let Err(e) = errs.finish() {
            return ToolEnvelope::failure(&e).render();
        }
        respond(self.requests_list(&filter).await, None)
    }
}

// Store-backed request lookups used by the request tools.
impl GatewayServer {
    async fn request_by_id(
        &self,
        request_id: &RequestId,
    ) -> stg_domain::error::Result<stg_domain::entities::HttpRequestRecord> {
        let store = stg_application::Store::require(self.store_ref())?;
        store
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| stg_domain::Error::not_found(format!("request {request_id}")))
    }

    async fn requests_list(
        &self,
        filter: &RequestSearch,
    ) -> stg_domain::error::Result<Vec<stg_domain::entities::HttpRequestRecord>> {
        let store = stg_application::Store::require(self.store_ref())?;
        store.requests.list(filter).await
    }
}
