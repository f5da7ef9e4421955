//! Mission lifecycle, action recording and technique search.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use stg_domain::entities::{ActionOutcome, Mission, MissionAction, MissionScope, MissionStatus};
use stg_domain::error::{Error, FieldError, Result};
use stg_domain::ports::{ActionSearch, EmbeddingProvider, MissionUpdate, NewAction, NewMission};
use stg_domain::value_objects::{Embedding, MissionId};

use crate::mission_context::MissionContext;
use crate::store::Store;

/// What `get_mission_context` (no focus) returns.
#[derive(Debug, Clone, Serialize)]
pub struct MissionContextInfo {
    pub active_mission_id: Option<String>,
    /// Resolved fresh from the store, not from the snapshot
    pub active_mission_name: Option<String>,
    pub active_cookie_profile: Option<String>,
}

/// What `get_mission_context` returns for the active mission.
#[derive(Debug, Clone, Serialize)]
pub struct MissionOverview {
    pub mission: Mission,
    /// Targets the mission has touched
    pub target_ids: Vec<stg_domain::value_objects::TargetId>,
    /// Newest first
    pub recent_actions: Vec<MissionAction>,
    /// Present when a focus text was given and embeddings are available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_actions: Option<Vec<(MissionAction, f32)>>,
}

/// Aggregate statistics for one technique label.
#[derive(Debug, Clone, Serialize)]
pub struct TechniqueStats {
    pub technique: String,
    pub usage_count: usize,
    /// Successes over all attempts; unknown outcomes count as attempts
    pub success_rate: f32,
    /// Results of failed attempts, most recent first
    pub failed_contexts: Vec<String>,
    pub last_used: Option<DateTime<Utc>>,
}

const RECENT_ACTIONS: usize = 10;
const FAILED_CONTEXTS: usize = 5;

/// Mission use cases.
pub struct MissionService {
    store: Option<Store>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    mission_context: Arc<MissionContext>,
}

impl MissionService {
    #[must_use]
    pub fn new(
        store: Option<Store>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        mission_context: Arc<MissionContext>,
    ) -> Self {
        Self {
            store,
            embedder,
            mission_context,
        }
    }

    /// Create a mission, embedding goal and hypothesis when possible.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable.
    pub async fn create(
        &self,
        name: String,
        goal: String,
        hypothesis: Option<String>,
        scope: MissionScope,
    ) -> Result<Mission> {
        let store = Store::require(self.store.as_ref())?;
        let goal_embedding = self.maybe_embed(&goal).await;
        let hypothesis_embedding = match &hypothesis {
            Some(h) => self.maybe_embed(h).await,
            None => None,
        };
        store
            .missions
            .create(NewMission {
                name,
                goal,
                hypothesis,
                scope,
                goal_embedding,
                hypothesis_embedding,
            })
            .await
    }

    /// Update mission fields, enforcing forward-only status transitions.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` on an illegal transition and
    /// `not_found` for unknown missions.
    pub async fn update(
        &self,
        mission_id: &MissionId,
        name: Option<String>,
        goal: Option<String>,
        hypothesis: Option<String>,
        status: Option<MissionStatus>,
    ) -> Result<Mission> {
        let store = Store::require(self.store.as_ref())?;
        let mission = self.get(mission_id).await?;

        let mut completed_at = None;
        if let Some(next) = status {
            if !mission.status.can_transition_to(next) {
                return Err(Error::validation(
                    format!(
                        "mission cannot transition from {} to {}",
                        mission.status.as_str(),
                        next.as_str()
                    ),
                    vec![FieldError::new(
                        "status",
                        "illegal transition",
                        Some(next.as_str().to_owned()),
                    )],
                ));
            }
            if next.is_terminal() {
                completed_at = Some(Utc::now());
            }
        }

        store
            .missions
            .update(
                mission_id,
                MissionUpdate {
                    name,
                    goal,
                    hypothesis,
                    status,
                    completed_at,
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Fails when the store is unavailable or the mission does not exist.
    pub async fn get(&self, mission_id: &MissionId) -> Result<Mission> {
        let store = Store::require(self.store.as_ref())?;
        store
            .missions
            .get(mission_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("mission {mission_id}")))
    }

    /// # Errors
    ///
    /// Fails when the store is unavailable.
    pub async fn list(
        &self,
        status: Option<MissionStatus>,
        limit: usize,
    ) -> Result<Vec<Mission>> {
        let store = Store::require(self.store.as_ref())?;
        store.missions.list(status, limit).await
    }

    /// Make a mission the connection's active mission.
    ///
    /// # Errors
    ///
    /// Fails when the mission does not exist.
    pub async fn set_context(
        &self,
        mission_id: &MissionId,
        cookie_profile: Option<String>,
    ) -> Result<Mission> {
        let mission = self.get(mission_id).await?;
        self.mission_context
            .set(mission.id, mission.name.clone(), cookie_profile);
        Ok(mission)
    }

    /// Clear the connection's active mission and cookie profile.
    pub fn clear_context(&self) {
        self.mission_context.clear();
    }

    /// Active mission info with the name resolved fresh from the store.
    ///
    /// # Errors
    ///
    /// Fails only on store errors during the fresh name lookup.
    pub async fn context_info(&self) -> Result<MissionContextInfo> {
        let snapshot = self.mission_context.snapshot();
        let name = match (&snapshot.mission_id, &self.store) {
            (Some(id), Some(store)) => store.missions.get(id).await?.map(|m| m.name),
            (Some(_), None) => snapshot.mission_name.clone(),
            (None, _) => None,
        };
        Ok(MissionContextInfo {
            active_mission_id: snapshot.mission_id.map(|id| id.as_str()),
            active_mission_name: name,
            active_cookie_profile: snapshot.cookie_profile.clone(),
        })
    }

    /// The active mission with its recent actions; a focus text adds a
    /// similarity search over the mission's action embeddings.
    ///
    /// # Errors
    ///
    /// Fails with `not_found` when no mission is active.
    pub async fn overview(&self, focus: Option<&str>) -> Result<MissionOverview> {
        let store = Store::require(self.store.as_ref())?;
        let mission_id = self
            .mission_context
            .resolve_mission(None)
            .ok_or_else(|| Error::not_found("no active mission"))?;
        let mission = self.get(&mission_id).await?;
        let target_ids = store.missions.targets(&mission_id).await?;
        let recent_actions = store
            .actions
            .list_for_mission(&mission_id, RECENT_ACTIONS)
            .await?;

        let similar_actions = match focus {
            Some(focus) => {
                let query = self.require_embedder()?.embed(focus).await?;
                Some(
                    store
                        .actions
                        .find_similar(&query, Some(&mission_id), RECENT_ACTIONS, 0.0)
                        .await?,
                )
            }
            None => None,
        };

        Ok(MissionOverview {
            mission,
            target_ids,
            recent_actions,
            similar_actions,
        })
    }

    /// Record an immutable action, then best-effort link the mission's most
    /// recent requests to it.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` when no mission is active and none was
    /// given explicitly.
    pub async fn record_action(
        &self,
        technique: String,
        result: String,
        outcome: ActionOutcome,
        hypothesis: Option<String>,
        learning: Option<String>,
        mission_id: Option<MissionId>,
        link_recent_requests: usize,
    ) -> Result<(MissionAction, usize)> {
        let store = Store::require(self.store.as_ref())?;
        let mission_id = self.mission_context.resolve_mission(mission_id).ok_or_else(|| {
            Error::validation(
                "no active mission; pass mission_id or call set_mission_context first",
                vec![FieldError::new("mission_id", "missing", None)],
            )
        })?;
        // Surface unknown missions before writing anything.
        self.get(&mission_id).await?;

        let action_embedding = self.maybe_embed(&technique).await;
        let result_embedding = self.maybe_embed(&result).await;
        let action = store
            .actions
            .append(NewAction {
                mission_id,
                technique,
                hypothesis,
                result,
                outcome,
                learning,
                action_embedding,
                result_embedding,
            })
            .await?;

        let linked = self
            .sweep_recent_requests(store, &mission_id, &action.id, link_recent_requests)
            .await;
        Ok((action, linked))
    }

    /// Cosine search over action embeddings.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` when embeddings are unavailable.
    pub async fn find_similar_actions(
        &self,
        query: &str,
        k: usize,
        min_similarity: f32,
        mission_id: Option<MissionId>,
    ) -> Result<Vec<(MissionAction, f32)>> {
        let store = Store::require(self.store.as_ref())?;
        let query = self.require_embedder()?.embed(query).await?;
        store
            .actions
            .find_similar(&query, mission_id.as_ref(), k, min_similarity)
            .await
    }

    /// Structured action search with an optional per-technique success-rate
    /// floor.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable.
    pub async fn search_techniques(
        &self,
        filter: ActionSearch,
        min_success_rate: Option<f32>,
    ) -> Result<Vec<MissionAction>> {
        let store = Store::require(self.store.as_ref())?;
        let actions = store.actions.search(&filter).await?;
        let Some(floor) = min_success_rate else {
            return Ok(actions);
        };

        let rates = Self::success_rates(&actions);
        Ok(actions
            .into_iter()
            .filter(|a| rates.get(&a.technique).copied().unwrap_or(0.0) >= floor)
            .collect())
    }

    /// Aggregate stats for one technique label.
    ///
    /// # Errors
    ///
    /// Fails with `not_found` when the technique was never recorded.
    pub async fn technique_stats(&self, technique: &str) -> Result<TechniqueStats> {
        let store = Store::require(self.store.as_ref())?;
        let actions = store
            .actions
            .search(&ActionSearch {
                technique_exact: Some(technique.to_owned()),
                limit: 1000,
                ..ActionSearch::default()
            })
            .await?;
        if actions.is_empty() {
            return Err(Error::not_found(format!("technique '{technique}'")));
        }

        let successes = actions
            .iter()
            .filter(|a| a.outcome == ActionOutcome::Success)
            .count();
        let failed_contexts = actions
            .iter()
            .filter(|a| a.outcome == ActionOutcome::Failure)
            .take(FAILED_CONTEXTS)
            .map(|a| a.result.clone())
            .collect();
        Ok(TechniqueStats {
            technique: technique.to_owned(),
            usage_count: actions.len(),
            success_rate: successes as f32 / actions.len() as f32,
            failed_contexts,
            last_used: actions.iter().map(|a| a.created_at).max(),
        })
    }

    /// Per-technique success rate over a set of actions; unknown outcomes
    /// count as attempts.
    fn success_rates(actions: &[MissionAction]) -> HashMap<String, f32> {
        let mut totals: HashMap<String, (usize, usize)> = HashMap::new();
        for action in actions {
            let entry = totals.entry(action.technique.clone()).or_default();
            entry.0 += 1;
            if action.outcome == ActionOutcome::Success {
                entry.1 += 1;
            }
        }
        totals
            .into_iter()
            .map(|(technique, (total, ok))| (technique, ok as f32 / total as f32))
            .collect()
    }

    async fn sweep_recent_requests(
        &self,
        store: &Store,
        mission_id: &MissionId,
        action_id: &stg_domain::value_objects::ActionId,
        window: usize,
    ) -> usize {
        if window == 0 {
            return 0;
        }
        let recent = match store.requests.recent_for_mission(mission_id, window).await {
            Ok(recent) => recent,
            Err(e) => {
                warn!(%mission_id, error = %e, "recent-request sweep failed");
                return 0;
            }
        };
        let mut linked = 0;
        for request in recent {
            match store.requests.link_to_action(&request.id, action_id).await {
                Ok(()) => linked += 1,
                Err(e) => warn!(request_id = %request.id, error = %e, "request link failed"),
            }
        }
        linked
    }

    fn require_embedder(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.embedder.as_ref().ok_or_else(|| {
            Error::validation(
                "embeddings_unavailable: the embedding model is disabled",
                vec![],
            )
        })
    }

    async fn maybe_embed(&self, text: &str) -> Option<Embedding> {
        match &self.embedder {
            Some(embedder) => match embedder.embed(text).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!(error = %e, "embedding failed; storing without vector");
                    None
                }
            },
            None => None,
        }
    }
}
