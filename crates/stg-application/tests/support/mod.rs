//! In-memory fakes over the domain ports, shared by the scenario tests.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use stg_application::Store;
use stg_domain::entities::{
    HttpRequestRecord, LibraryEntry, LibraryStats, Mission, MissionAction, MissionStatus, Target,
    TargetContext,
};
use stg_domain::error::{Error, Result};
use stg_domain::ports::{
    ActionRepository, ActionSearch, ContextRepository, CookieProfile, CookieProfileInfo,
    CookieProfileSource, HttpTransport, LibraryRepository, MissionRepository, MissionUpdate,
    NewAction, NewContextVersion, NewHttpRequest, NewLibraryEntry, NewMission, RequestRepository,
    RequestSearch, TargetDefaults, TargetRepository, TargetSearch, TargetUpdate, TransferFailure,
    TransferFailureKind, TransferOutcome, TransferRequest,
};
use stg_domain::value_objects::{
    ActionId, ContextId, Embedding, EntryId, MissionId, RequestId, TargetId, TargetKey,
};

/// One shared in-memory "database" behind every fake repository.
#[derive(Default)]
pub struct FakeDb {
    pub targets: Vec<Target>,
    pub contexts: Vec<TargetContext>,
    pub missions: Vec<Mission>,
    pub mission_targets: Vec<(MissionId, TargetId)>,
    pub actions: Vec<MissionAction>,
    pub action_embeddings: HashMap<ActionId, Embedding>,
    pub requests: Vec<HttpRequestRecord>,
    pub library: Vec<(LibraryEntry, Option<Embedding>)>,
    /// Failure injection for error-swallowing tests
    pub fail_request_insert: bool,
    pub fail_target_upsert: bool,
}

pub type SharedDb = Arc<Mutex<FakeDb>>;

/// Build a [`Store`] whose repositories all share one [`FakeDb`].
pub fn fake_store() -> (Store, SharedDb) {
    let db: SharedDb = Arc::new(Mutex::new(FakeDb::default()));
    let store = Store {
        targets: Arc::new(FakeTargets(Arc::clone(&db))),
        contexts: Arc::new(FakeContexts(Arc::clone(&db))),
        missions: Arc::new(FakeMissions(Arc::clone(&db))),
        actions: Arc::new(FakeActions(Arc::clone(&db))),
        requests: Arc::new(FakeRequests(Arc::clone(&db))),
        library: Arc::new(FakeLibrary(Arc::clone(&db))),
    };
    (store, db)
}

pub struct FakeTargets(pub SharedDb);

#[async_trait]
impl TargetRepository for FakeTargets {
    async fn upsert(&self, key: &TargetKey, defaults: TargetDefaults) -> Result<(Target, bool)> {
        let mut db = self.0.lock().unwrap();
        if db.fail_target_upsert {
            return Err(Error::database("injected target upsert failure"));
        }
        if let Some(existing) = db.targets.iter().find(|t| t.key() == *key) {
            return Ok((existing.clone(), false));
        }
        let now = Utc::now();
        let target = Target {
            id: TargetId::new(),
            host: key.host.clone(),
            port: key.port,
            protocol: key.protocol,
            title: defaults.title,
            status: defaults.status,
            risk_level: defaults.risk_level,
            metadata: defaults.metadata,
            current_context_id: None,
            last_activity: None,
            created_at: now,
            updated_at: now,
        };
        db.targets.push(target.clone());
        Ok((target, true))
    }

    async fn get(&self, id: &TargetId) -> Result<Option<Target>> {
        let db = self.0.lock().unwrap();
        Ok(db.targets.iter().find(|t| t.id == *id).cloned())
    }

    async fn update_fields(&self, id: &TargetId, update: TargetUpdate) -> Result<Target> {
        let mut db = self.0.lock().unwrap();
        let target = db
            .targets
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| Error::not_found(format!("target {id}")))?;
        if let Some(status) = update.status {
            target.status = status;
        }
        if let Some(risk) = update.risk_level {
            target.risk_level = risk;
        }
        if let Some(title) = update.title {
            target.title = Some(title);
        }
        if let Some(metadata) = update.metadata {
            target.metadata.extend(metadata);
        }
        target.updated_at = Utc::now();
        Ok(target.clone())
    }

    async fn search(&self, filter: &TargetSearch) -> Result<Vec<Target>> {
        let db = self.0.lock().unwrap();
        let query = filter.query.as_deref().map(str::to_lowercase);
        let mut hits: Vec<Target> = db
            .targets
            .iter()
            .filter(|t| {
                query.as_deref().is_none_or(|q| {
                    t.host.contains(q)
                        || t.title.as_deref().is_some_and(|title| {
                            title.to_lowercase().contains(q)
                        })
                })
            })
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.risk_level.is_none_or(|r| t.risk_level == r))
            .filter(|t| filter.protocol.is_none_or(|p| t.protocol == p))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        hits.truncate(filter.limit.max(1));
        Ok(hits)
    }

    async fn touch_activity(&self, id: &TargetId, at: chrono::DateTime<Utc>) -> Result<()> {
        let mut db = self.0.lock().unwrap();
        if let Some(target) = db.targets.iter_mut().find(|t| t.id == *id) {
            target.last_activity = Some(at);
        }
        Ok(())
    }

    async fn request_count(&self, id: &TargetId) -> Result<i64> {
        let db = self.0.lock().unwrap();
        Ok(db
            .requests
            .iter()
            .filter(|r| r.target_id == Some(*id))
            .count() as i64)
    }
}

pub struct FakeContexts(pub SharedDb);

#[async_trait]
impl ContextRepository for FakeContexts {
    async fn append(&self, target_id: &TargetId, new: NewContextVersion) -> Result<TargetContext> {
        let mut db = self.0.lock().unwrap();
        if !db.targets.iter().any(|t| t.id == *target_id) {
            return Err(Error::not_found(format!("target {target_id}")));
        }
        let current = db
            .contexts
            .iter()
            .filter(|c| c.target_id == *target_id)
            .max_by_key(|c| c.version)
            .cloned();
        let current_version = current.as_ref().map(|c| c.version);
        if current_version != new.expected_version {
            return Err(Error::conflict(format!(
                "context version moved to {current_version:?} while expecting {:?}",
                new.expected_version
            )));
        }
        let context = TargetContext {
            id: ContextId::new(),
            target_id: *target_id,
            version: current_version.unwrap_or(0) + 1,
            parent_version_id: current.map(|c| c.id),
            user_context: new.user_context,
            agent_context: new.agent_context,
            created_by: new.created_by,
            change_summary: new.change_summary,
            change_type: new.change_type,
            created_at: Utc::now(),
        };
        db.contexts.push(context.clone());
        if let Some(target) = db.targets.iter_mut().find(|t| t.id == *target_id) {
            target.current_context_id = Some(context.id);
        }
        Ok(context)
    }

    async fn current(&self, target_id: &TargetId) -> Result<Option<TargetContext>> {
        let db = self.0.lock().unwrap();
        Ok(db
            .contexts
            .iter()
            .filter(|c| c.target_id == *target_id)
            .max_by_key(|c| c.version)
            .cloned())
    }

    async fn history(&self, target_id: &TargetId, limit: usize) -> Result<Vec<TargetContext>> {
        let db = self.0.lock().unwrap();
        let mut versions: Vec<TargetContext> = db
            .contexts
            .iter()
            .filter(|c| c.target_id == *target_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions.truncate(limit);
        Ok(versions)
    }

    async fn get(&self, id: &ContextId) -> Result<Option<TargetContext>> {
        let db = self.0.lock().unwrap();
        Ok(db.contexts.iter().find(|c| c.id == *id).cloned())
    }
}

pub struct FakeMissions(pub SharedDb);

#[async_trait]
impl MissionRepository for FakeMissions {
    async fn create(&self, new: NewMission) -> Result<Mission> {
        let mut db = self.0.lock().unwrap();
        let mission = Mission {
            id: MissionId::new(),
            name: new.name,
            goal: new.goal,
            hypothesis: new.hypothesis,
            scope: new.scope,
            status: MissionStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
        };
        db.missions.push(mission.clone());
        Ok(mission)
    }

    async fn get(&self, id: &MissionId) -> Result<Option<Mission>> {
        let db = self.0.lock().unwrap();
        Ok(db.missions.iter().find(|m| m.id == *id).cloned())
    }

    async fn update(&self, id: &MissionId, update: MissionUpdate) -> Result<Mission> {
        let mut db = self.0.lock().unwrap();
        let mission = db
            .missions
            .iter_mut()
            .find(|m| m.id == *id)
            .ok_or_else(|| Error::not_found(format!("mission {id}")))?;
        if let Some(name) = update.name {
            mission.name = name;
        }
        if let Some(goal) = update.goal {
            mission.goal = goal;
        }
        if let Some(hypothesis) = update.hypothesis {
            mission.hypothesis = Some(hypothesis);
        }
        if let Some(status) = update.status {
            mission.status = status;
        }
        if update.completed_at.is_some() {
            mission.completed_at = update.completed_at;
        }
        Ok(mission.clone())
    }

    async fn list(&self, status: Option<MissionStatus>, limit: usize) -> Result<Vec<Mission>> {
        let db = self.0.lock().unwrap();
        let mut missions: Vec<Mission> = db
            .missions
            .iter()
            .filter(|m| status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        missions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        missions.truncate(limit);
        Ok(missions)
    }

    async fn associate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()> {
        let mut db = self.0.lock().unwrap();
        if !db
            .mission_targets
            .contains(&(*mission_id, *target_id))
        {
            db.mission_targets.push((*mission_id, *target_id));
        }
        Ok(())
    }

    async fn dissociate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()> {
        let mut db = self.0.lock().unwrap();
        db.mission_targets
            .retain(|(m, t)| !(m == mission_id && t == target_id));
        Ok(())
    }

    async fn targets(&self, mission_id: &MissionId) -> Result<Vec<TargetId>> {
        let db = self.0.lock().unwrap();
        Ok(db
            .mission_targets
            .iter()
            .filter(|(m, _)| m == mission_id)
            .map(|(_, t)| *t)
            .collect())
    }
}

pub struct FakeActions(pub SharedDb);

#[async_trait]
impl ActionRepository for FakeActions {
    async fn append(&self, new: NewAction) -> Result<MissionAction> {
        let mut db = self.0.lock().unwrap();
        let action = MissionAction {
            id: ActionId::new(),
            mission_id: new.mission_id,
            technique: new.technique,
            hypothesis: new.hypothesis,
            result: new.result,
            outcome: new.outcome,
            learning: new.learning,
            created_at: Utc::now(),
        };
        if let Some(embedding) = new.action_embedding {
            db.action_embeddings.insert(action.id, embedding);
        }
        db.actions.push(action.clone());
        Ok(action)
    }

    async fn latest(&self, mission_id: &MissionId) -> Result<Option<MissionAction>> {
        let db = self.0.lock().unwrap();
        Ok(db
            .actions
            .iter()
            .filter(|a| a.mission_id == *mission_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn list_for_mission(
        &self,
        mission_id: &MissionId,
        limit: usize,
    ) -> Result<Vec<MissionAction>> {
        let db = self.0.lock().unwrap();
        let mut actions: Vec<MissionAction> = db
            .actions
            .iter()
            .filter(|a| a.mission_id == *mission_id)
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        actions.truncate(limit);
        Ok(actions)
    }

    async fn search(&self, filter: &ActionSearch) -> Result<Vec<MissionAction>> {
        let db = self.0.lock().unwrap();
        let mut actions: Vec<MissionAction> = db
            .actions
            .iter()
            .filter(|a| filter.mission_id.is_none_or(|m| a.mission_id == m))
            .filter(|a| {
                filter.mission_status.is_none_or(|s| {
                    db.missions
                        .iter()
                        .any(|m| m.id == a.mission_id && m.status == s)
                })
            })
            .filter(|a| {
                filter
                    .technique_substring
                    .as_deref()
                    .is_none_or(|s| a.technique.to_lowercase().contains(&s.to_lowercase()))
            })
            .filter(|a| {
                filter
                    .technique_exact
                    .as_deref()
                    .is_none_or(|s| a.technique == s)
            })
            .filter(|a| {
                !filter.success_only
                    || a.outcome == stg_domain::entities::ActionOutcome::Success
            })
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        actions.truncate(filter.limit.max(1));
        Ok(actions)
    }

    async fn find_similar(
        &self,
        query: &Embedding,
        mission_id: Option<&MissionId>,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(MissionAction, f32)>> {
        let db = self.0.lock().unwrap();
        let mut scored: Vec<(MissionAction, f32)> = db
            .actions
            .iter()
            .filter(|a| mission_id.is_none_or(|m| a.mission_id == *m))
            .filter_map(|a| {
                db.action_embeddings
                    .get(&a.id)
                    .map(|e| (a.clone(), query.cosine_similarity(e)))
            })
            .filter(|(_, score)| *score >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }
}

pub struct FakeRequests(pub SharedDb);

#[async_trait]
impl RequestRepository for FakeRequests {
    async fn insert(&self, new: NewHttpRequest) -> Result<HttpRequestRecord> {
        let mut db = self.0.lock().unwrap();
        if db.fail_request_insert {
            return Err(Error::database("injected request insert failure"));
        }
        let record = HttpRequestRecord {
            id: RequestId::new(),
            method: new.method,
            url: new.url,
            final_url: new.final_url,
            host: new.host,
            path: new.path,
            query_params: new.query_params,
            request_headers: new.request_headers,
            request_cookies: new.request_cookies,
            request_body: new.request_body,
            request_body_size: new.request_body_size,
            status_code: new.status_code,
            response_headers: new.response_headers,
            response_body: new.response_body,
            response_body_size: new.response_body_size,
            elapsed_ms: new.elapsed_ms,
            error: new.error,
            target_id: new.target_id,
            action_id: None,
            created_at: new.created_at,
        };
        db.requests.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &RequestId) -> Result<Option<HttpRequestRecord>> {
        let db = self.0.lock().unwrap();
        Ok(db.requests.iter().find(|r| r.id == *id).cloned())
    }

    async fn link_to_action(&self, request_id: &RequestId, action_id: &ActionId) -> Result<()> {
        let mut db = self.0.lock().unwrap();
        if let Some(request) = db.requests.iter_mut().find(|r| r.id == *request_id) {
            request.action_id = Some(*action_id);
        }
        Ok(())
    }

    async fn recent_for_mission(
        &self,
        mission_id: &MissionId,
        count: usize,
    ) -> Result<Vec<HttpRequestRecord>> {
        let db = self.0.lock().unwrap();
        let action_ids: Vec<ActionId> = db
            .actions
            .iter()
            .filter(|a| a.mission_id == *mission_id)
            .map(|a| a.id)
            .collect();
        let mut requests: Vec<HttpRequestRecord> = db
            .requests
            .iter()
            .filter(|r| r.action_id.is_some_and(|a| action_ids.contains(&a)))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(count);
        Ok(requests)
    }

    async fn list(&self, filter: &RequestSearch) -> Result<Vec<HttpRequestRecord>> {
        let db = self.0.lock().unwrap();
        let mut requests: Vec<HttpRequestRecord> = db
            .requests
            .iter()
            .filter(|r| filter.target_id.is_none_or(|t| r.target_id == Some(t)))
            .filter(|r| {
                filter
                    .host
                    .as_deref()
                    .is_none_or(|h| r.host.as_deref() == Some(h))
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(filter.limit.max(1));
        Ok(requests)
    }
}

pub struct FakeLibrary(pub SharedDb);

#[async_trait]
impl LibraryRepository for FakeLibrary {
    async fn add(&self, new: NewLibraryEntry) -> Result<LibraryEntry> {
        let mut db = self.0.lock().unwrap();
        let entry = LibraryEntry {
            id: EntryId::new(),
            title: new.title,
            content: new.content,
            category: new.category,
            tags: new.tags,
            metadata: new.metadata,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        };
        db.library.push((entry.clone(), new.content_embedding));
        Ok(entry)
    }

    async fn get(&self, id: &EntryId) -> Result<Option<LibraryEntry>> {
        let db = self.0.lock().unwrap();
        Ok(db
            .library
            .iter()
            .find(|(e, _)| e.id == *id)
            .map(|(e, _)| e.clone()))
    }

    async fn search_by_vector(
        &self,
        query: &Embedding,
        k: usize,
        min_similarity: f32,
        category: Option<&str>,
    ) -> Result<Vec<(LibraryEntry, f32)>> {
        let db = self.0.lock().unwrap();
        let mut scored: Vec<(LibraryEntry, f32)> = db
            .library
            .iter()
            .filter(|(e, _)| category.is_none_or(|c| e.category == c))
            .filter_map(|(e, embedding)| {
                embedding
                    .as_ref()
                    .map(|v| (e.clone(), query.cosine_similarity(v)))
            })
            .filter(|(_, score)| *score >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    async fn record_usage(&self, ids: &[EntryId]) -> Result<()> {
        let mut db = self.0.lock().unwrap();
        let now = Utc::now();
        for (entry, _) in &mut db.library {
            if ids.contains(&entry.id) {
                entry.usage_count += 1;
                entry.last_used_at = Some(now);
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<LibraryStats> {
        let db = self.0.lock().unwrap();
        let mut by_category: HashMap<String, i64> = HashMap::new();
        let mut tag_counts: HashMap<String, i64> = HashMap::new();
        for (entry, _) in &db.library {
            *by_category.entry(entry.category.clone()).or_default() += 1;
            for tag in &entry.tags {
                *tag_counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut top_tags: Vec<(String, i64)> = tag_counts.into_iter().collect();
        top_tags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_tags.truncate(10);
        Ok(LibraryStats {
            entry_count: db.library.len() as i64,
            by_category,
            top_tags,
        })
    }
}

/// Scripted transport: pops pre-programmed outcomes and records every
/// effective request it saw.
#[derive(Default)]
pub struct StubTransport {
    outcomes: Mutex<VecDeque<TransferOutcome>>,
    pub seen: Mutex<Vec<TransferRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: TransferOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn ok(status: u16, final_url: &str, body: &[u8]) -> TransferOutcome {
        TransferOutcome {
            status: Some(status),
            headers: HashMap::new(),
            body: body.to_vec(),
            final_url: final_url.to_owned(),
            elapsed_ms: 12,
            failure: None,
        }
    }

    pub fn failed(kind: TransferFailureKind, message: &str, url: &str) -> TransferOutcome {
        TransferOutcome {
            status: None,
            headers: HashMap::new(),
            body: Vec::new(),
            final_url: url.to_owned(),
            elapsed_ms: 30_000,
            failure: Some(TransferFailure {
                kind,
                message: message.to_owned(),
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        self.seen.lock().unwrap().push(request.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Self::ok(200, &request.url, b"ok"));
        Ok(outcome)
    }
}

/// Fixed in-memory cookie profile source.
pub struct FakeCookieSource {
    pub profiles: HashMap<String, HashMap<String, String>>,
}

#[async_trait]
impl CookieProfileSource for FakeCookieSource {
    async fn get(&self, name: &str) -> Result<CookieProfile> {
        let cookies = self
            .profiles
            .get(name)
            .ok_or_else(|| Error::not_found(format!("cookie profile '{name}'")))?;
        Ok(CookieProfile {
            name: name.to_owned(),
            cookies: cookies.clone(),
            last_updated: Utc::now(),
            description: None,
            metadata: HashMap::new(),
        })
    }

    async fn list(&self) -> Result<Vec<CookieProfileInfo>> {
        Ok(self
            .profiles
            .keys()
            .map(|name| CookieProfileInfo {
                name: name.clone(),
                description: None,
                cache_ttl_secs: 300,
                metadata: HashMap::new(),
            })
            .collect())
    }
}
