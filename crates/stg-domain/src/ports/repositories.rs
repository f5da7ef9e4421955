//! Persistence ports.
//!
//! One trait per entity group, mirroring the store contracts: every write is
//! a single transaction, reads may be auto-commit. Implementations live in
//! the providers layer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entities::{
    ActionOutcome, ContextAuthor, HttpMethod, HttpRequestRecord, LibraryEntry, LibraryStats,
    Mission, MissionAction, MissionScope, MissionStatus, RiskLevel, Target, TargetContext,
    TargetStatus,
};
use crate::error::Result;
use crate::value_objects::{
    ActionId, ContextId, Embedding, EntryId, MissionId, Protocol, RequestId, TargetId, TargetKey,
};

/// Defaults applied when an upsert creates a new target.
#[derive(Debug, Clone)]
pub struct TargetDefaults {
    pub status: TargetStatus,
    pub risk_level: RiskLevel,
    pub title: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            status: TargetStatus::Active,
            risk_level: RiskLevel::Medium,
            title: None,
            metadata: HashMap::new(),
        }
    }
}

/// Partial update of a target's mutable fields.
#[derive(Debug, Clone, Default)]
pub struct TargetUpdate {
    pub status: Option<TargetStatus>,
    pub risk_level: Option<RiskLevel>,
    pub title: Option<String>,
    /// Keys merged into the existing metadata map
    pub metadata: Option<HashMap<String, Value>>,
}

/// Filter for target search.
#[derive(Debug, Clone, Default)]
pub struct TargetSearch {
    /// Case-insensitive substring over host and title
    pub query: Option<String>,
    pub status: Option<TargetStatus>,
    pub risk_level: Option<RiskLevel>,
    pub protocol: Option<Protocol>,
    pub limit: usize,
}

/// Port for target persistence.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Atomic upsert by `(host, port, protocol)`; on conflict returns the
    /// existing row unchanged. The boolean reports whether a row was created.
    async fn upsert(&self, key: &TargetKey, defaults: TargetDefaults) -> Result<(Target, bool)>;

    async fn get(&self, id: &TargetId) -> Result<Option<Target>>;

    async fn update_fields(&self, id: &TargetId, update: TargetUpdate) -> Result<Target>;

    /// Results sorted by `last_activity` descending.
    async fn search(&self, filter: &TargetSearch) -> Result<Vec<Target>>;

    /// Bump `last_activity` to the given instant.
    async fn touch_activity(&self, id: &TargetId, at: DateTime<Utc>) -> Result<()>;

    /// Number of persisted requests attributed to the target.
    async fn request_count(&self, id: &TargetId) -> Result<i64>;
}

/// Content of a context version to append.
///
/// `user_context` / `agent_context` carry the final field values (merge
/// semantics are an application concern). `expected_version` is the version
/// the caller observed; the append fails with a conflict when another writer
/// got there first.
#[derive(Debug, Clone)]
pub struct NewContextVersion {
    pub user_context: String,
    pub agent_context: String,
    pub created_by: ContextAuthor,
    pub change_summary: Option<String>,
    pub change_type: Option<String>,
    /// `None` asserts the target has no context yet
    pub expected_version: Option<i32>,
}

/// Port for the immutable context-version chain.
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Append a version in one transaction: row-lock the target, verify
    /// `expected_version`, insert `version = current + 1`, move the target's
    /// head pointer. Fails with a conflict when the expectation is stale.
    async fn append(&self, target_id: &TargetId, new: NewContextVersion) -> Result<TargetContext>;

    async fn current(&self, target_id: &TargetId) -> Result<Option<TargetContext>>;

    /// Newest first.
    async fn history(&self, target_id: &TargetId, limit: usize) -> Result<Vec<TargetContext>>;

    async fn get(&self, id: &ContextId) -> Result<Option<TargetContext>>;
}

/// Content of a mission to create.
#[derive(Debug, Clone)]
pub struct NewMission {
    pub name: String,
    pub goal: String,
    pub hypothesis: Option<String>,
    pub scope: MissionScope,
    pub goal_embedding: Option<Embedding>,
    pub hypothesis_embedding: Option<Embedding>,
}

/// Partial update of a mission.
#[derive(Debug, Clone, Default)]
pub struct MissionUpdate {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub hypothesis: Option<String>,
    pub status: Option<MissionStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Port for mission persistence.
#[async_trait]
pub trait MissionRepository: Send + Sync {
    async fn create(&self, new: NewMission) -> Result<Mission>;

    async fn get(&self, id: &MissionId) -> Result<Option<Mission>>;

    async fn update(&self, id: &MissionId, update: MissionUpdate) -> Result<Mission>;

    async fn list(&self, status: Option<MissionStatus>, limit: usize) -> Result<Vec<Mission>>;

    /// Idempotent.
    async fn associate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()>;

    async fn dissociate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()>;

    async fn targets(&self, mission_id: &MissionId) -> Result<Vec<TargetId>>;
}

/// Content of a mission action to append.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub mission_id: MissionId,
    pub technique: String,
    pub hypothesis: Option<String>,
    pub result: String,
    pub outcome: ActionOutcome,
    pub learning: Option<String>,
    pub action_embedding: Option<Embedding>,
    pub result_embedding: Option<Embedding>,
}

/// Filter for action search.
#[derive(Debug, Clone, Default)]
pub struct ActionSearch {
    pub mission_id: Option<MissionId>,
    /// Restrict to missions currently in this status
    pub mission_status: Option<MissionStatus>,
    pub technique_substring: Option<String>,
    pub technique_exact: Option<String>,
    pub success_only: bool,
    pub limit: usize,
}

/// Port for immutable mission action records.
#[async_trait]
pub trait ActionRepository: Send + Sync {
    async fn append(&self, new: NewAction) -> Result<MissionAction>;

    /// Most recent action by `created_at`, ties broken by id.
    async fn latest(&self, mission_id: &MissionId) -> Result<Option<MissionAction>>;

    /// Newest first.
    async fn list_for_mission(
        &self,
        mission_id: &MissionId,
        limit: usize,
    ) -> Result<Vec<MissionAction>>;

    async fn search(&self, filter: &ActionSearch) -> Result<Vec<MissionAction>>;

    /// Cosine k-NN over action embeddings; scores are `1 - distance`,
    /// descending, filtered at `min_similarity`.
    async fn find_similar(
        &self,
        query: &Embedding,
        mission_id: Option<&MissionId>,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(MissionAction, f32)>>;
}

/// Content of an HTTP request record to insert.
#[derive(Debug, Clone)]
pub struct NewHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub final_url: String,
    pub host: Option<String>,
    pub path: Option<String>,
    pub query_params: HashMap<String, String>,
    pub request_headers: HashMap<String, String>,
    pub request_cookies: HashMap<String, String>,
    pub request_body: Option<String>,
    pub request_body_size: Option<i64>,
    pub status_code: Option<i32>,
    pub response_headers: HashMap<String, String>,
    pub response_body: Option<String>,
    pub response_body_size: Option<i64>,
    pub elapsed_ms: Option<i64>,
    pub error: Option<String>,
    pub target_id: Option<TargetId>,
    pub created_at: DateTime<Utc>,
}

/// Filter for request listing.
#[derive(Debug, Clone, Default)]
pub struct RequestSearch {
    pub target_id: Option<TargetId>,
    pub host: Option<String>,
    pub limit: usize,
}

/// Port for persisted HTTP requests.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Ids are generated here, so inserts never fail the observed request on
    /// a uniqueness surprise.
    async fn insert(&self, new: NewHttpRequest) -> Result<HttpRequestRecord>;

    async fn get(&self, id: &RequestId) -> Result<Option<HttpRequestRecord>>;

    /// Point the record at an action. Idempotent for the same pair; a later
    /// link overwrites an earlier one.
    async fn link_to_action(&self, request_id: &RequestId, action_id: &ActionId) -> Result<()>;

    /// Last `count` requests linked to the mission through its actions,
    /// newest first.
    async fn recent_for_mission(
        &self,
        mission_id: &MissionId,
        count: usize,
    ) -> Result<Vec<HttpRequestRecord>>;

    async fn list(&self, filter: &RequestSearch) -> Result<Vec<HttpRequestRecord>>;
}

/// Content of a library entry to add.
#[derive(Debug, Clone)]
pub struct NewLibraryEntry {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, Value>,
    pub content_embedding: Option<Embedding>,
}

/// Port for the curated technique library.
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn add(&self, new: NewLibraryEntry) -> Result<LibraryEntry>;

    async fn get(&self, id: &EntryId) -> Result<Option<LibraryEntry>>;

    /// Cosine k-NN over content embeddings; scores are `1 - distance`,
    /// descending, filtered at `min_similarity`.
    async fn search_by_vector(
        &self,
        query: &Embedding,
        k: usize,
        min_similarity: f32,
        category: Option<&str>,
    ) -> Result<Vec<(LibraryEntry, f32)>>;

    /// Bump usage statistics for retrieved entries.
    async fn record_usage(&self, ids: &[EntryId]) -> Result<()>;

    async fn stats(&self) -> Result<LibraryStats>;
}
