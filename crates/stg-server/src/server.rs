//! The gateway server: per-connection state, services, MCP handler.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::{
    ListResourcesResult, PaginatedRequestParam, ReadResourceRequestParam, ReadResourceResult,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler, tool_handler};

use stg_application::services::{ContextService, LibraryService, MissionService, TargetService};
use stg_application::{
    BodyLimits, HttpExecutor, MissionContext, RedactionPolicy, RequestLogger, Store,
};
use stg_domain::ports::{CookieProfileSource, EmbeddingProvider, HttpTransport};
use stg_infrastructure::prompts::PromptLibrary;

use crate::resources;

/// Everything the server needs, assembled at bootstrap.
pub struct GatewayDeps {
    pub store: Option<Store>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub transport: Arc<dyn HttpTransport>,
    pub cookie_profiles: Option<Arc<dyn CookieProfileSource>>,
    pub prompts: Arc<PromptLibrary>,
    pub default_proxy: Option<String>,
    pub redaction: RedactionPolicy,
    pub limits: BodyLimits,
    /// Per-request timeout when the caller does not override it
    pub default_timeout_ms: u64,
}

/// One instance per agent connection; the mission context inside is the
/// connection's private state.
#[derive(Clone)]
pub struct GatewayServer {
    pub(crate) targets: Arc<TargetService>,
    pub(crate) contexts: Arc<ContextService>,
    pub(crate) missions: Arc<MissionService>,
    pub(crate) library: Arc<LibraryService>,
    pub(crate) executor: Arc<HttpExecutor>,
    pub(crate) mission_context: Arc<MissionContext>,
    pub(crate) cookie_profiles: Option<Arc<dyn CookieProfileSource>>,
    pub(crate) prompts: Arc<PromptLibrary>,
    pub(crate) store: Option<Store>,
    pub(crate) default_timeout_ms: u64,
    pub(crate) tool_router: ToolRouter<Self>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(deps: GatewayDeps) -> Self {
        let mission_context = Arc::new(MissionContext::new());
        let logger = Arc::new(RequestLogger::new(
            deps.store.clone(),
            deps.redaction,
            deps.limits,
        ));
        let executor = Arc::new(HttpExecutor::new(
            deps.transport,
            deps.cookie_profiles.clone(),
            logger,
            Arc::clone(&mission_context),
            deps.default_proxy,
            deps.limits,
        ));

        Self {
            targets: Arc::new(TargetService::new(deps.store.clone())),
            contexts: Arc::new(ContextService::new(deps.store.clone())),
            missions: Arc::new(MissionService::new(
                deps.store.clone(),
                deps.embedder.clone(),
                Arc::clone(&mission_context),
            )),
            library: Arc::new(LibraryService::new(deps.store.clone(), deps.embedder)),
            executor,
            mission_context,
            cookie_profiles: deps.cookie_profiles,
            prompts: deps.prompts,
            store: deps.store,
            default_timeout_ms: deps.default_timeout_ms,
            tool_router: Self::tool_router(),
        }
    }

    pub(crate) fn store_ref(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// The per-connection mission context (exposed for tests).
    #[must_use]
    pub fn mission_context(&self) -> &Arc<MissionContext> {
        &self.mission_context
    }

    /// The envelope reminder shown while a mission is active.
    pub(crate) fn mission_note(&self) -> Option<String> {
        let snapshot = self.mission_context.snapshot();
        let id = snapshot.mission_id?;
        Some(match &snapshot.mission_name {
            Some(name) => format!("Logged to mission {id} ({name})"),
            None => format!("Logged to mission {id}"),
        })
    }
}

#[tool_handler]
impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(
                "Instrumented HTTP gateway for security testing. Issue requests with \
                 http_request; every transfer is persisted and attributed to a target. \
                 Manage engagements with the mission tools, record technique attempts \
                 with record_action, and curate durable knowledge in the library. \
                 Cookie profiles and prompt guides are available as resources."
                    .to_owned(),
            ),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let resources = resources::list(self.cookie_profiles.as_ref(), &self.prompts).await?;
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri, .. }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let contents =
            resources::read(self.cookie_profiles.as_ref(), &self.prompts, &uri).await?;
        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }
}
