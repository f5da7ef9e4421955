//! Target CRUD and summaries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use stg_domain::entities::{RiskLevel, Target, TargetStatus};
use stg_domain::error::{Error, FieldError, Result};
use stg_domain::ports::{TargetDefaults, TargetSearch, TargetUpdate};
use stg_domain::value_objects::{Protocol, TargetId, TargetKey};

use crate::store::Store;

/// What `get_target_summary` returns.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub target: Target,
    pub request_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
    /// First few hundred characters of the current context, agent notes first
    pub current_context_excerpt: Option<String>,
}

const EXCERPT_CHARS: usize = 280;

/// Target use cases.
pub struct TargetService {
    store: Option<Store>,
}

impl TargetService {
    #[must_use]
    pub fn new(store: Option<Store>) -> Self {
        Self { store }
    }

    /// Explicit target creation; returns the target and whether it was new.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable or the upsert fails.
    pub async fn create(
        &self,
        host: &str,
        port: Option<u16>,
        protocol: Protocol,
        title: Option<String>,
        status: TargetStatus,
        risk_level: RiskLevel,
        notes: Option<String>,
    ) -> Result<(Target, bool)> {
        let store = Store::require(self.store.as_ref())?;
        let key = TargetKey::new(host, port, protocol);
        let mut metadata = HashMap::new();
        if let Some(notes) = notes {
            metadata.insert("notes".to_owned(), Value::String(notes));
        }
        store
            .targets
            .upsert(
                &key,
                TargetDefaults {
                    status,
                    risk_level,
                    title,
                    metadata,
                },
            )
            .await
    }

    /// Update status / risk / notes, enforcing the target state machine.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` on an illegal status transition, and
    /// with `not_found` when the target does not exist.
    pub async fn update_status(
        &self,
        target_id: &TargetId,
        status: Option<TargetStatus>,
        risk_level: Option<RiskLevel>,
        notes: Option<String>,
    ) -> Result<Target> {
        let store = Store::require(self.store.as_ref())?;
        if let Some(next) = status {
            let target = store
                .targets
                .get(target_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("target {target_id}")))?;
            if !target.status.can_transition_to(next) {
                return Err(Error::validation(
                    format!(
                        "target cannot transition from {} to {}",
                        target.status.as_str(),
                        next.as_str()
                    ),
                    vec![FieldError::new(
                        "status",
                        "illegal transition",
                        Some(next.as_str().to_owned()),
                    )],
                ));
            }
        }
        let metadata = notes.map(|notes| {
            let mut m = HashMap::new();
            m.insert("notes".to_owned(), Value::String(notes));
            m
        });
        store
            .targets
            .update_fields(
                target_id,
                TargetUpdate {
                    status,
                    risk_level,
                    title: None,
                    metadata,
                },
            )
            .await
    }

    /// Target plus request count, last activity and context excerpt.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable or the target does not exist.
    pub async fn summary(&self, target_id: &TargetId) -> Result<TargetSummary> {
        let store = Store::require(self.store.as_ref())?;
        let target = store
            .targets
            .get(target_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("target {target_id}")))?;
        let request_count = store.targets.request_count(target_id).await?;
        let current = store.contexts.current(target_id).await?;
        let excerpt = current.map(|c| {
            let text = if c.agent_context.is_empty() {
                c.user_context
            } else {
                c.agent_context
            };
            text.chars().take(EXCERPT_CHARS).collect::<String>()
        });
        Ok(TargetSummary {
            last_activity: target.last_activity,
            target,
            request_count,
            current_context_excerpt: excerpt,
        })
    }

    /// Case-insensitive substring search, sorted by recent activity.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable.
    pub async fn search(&self, filter: &TargetSearch) -> Result<Vec<Target>> {
        let store = Store::require(self.store.as_ref())?;
        store.targets.search(filter).await
    }
}
