//! Versioned context read/write with append/replace merge semantics.

use serde::Serialize;

use stg_domain::entities::{ContextAuthor, ContextDiff, TargetContext};
use stg_domain::error::{Error, FieldError, Result};
use stg_domain::ports::NewContextVersion;
use stg_domain::value_objects::{ContextId, TargetId};

use crate::store::Store;

/// What `get_target_context` returns.
#[derive(Debug, Clone, Serialize)]
pub struct ContextView {
    /// The current version, or the explicitly requested one
    pub current: Option<TargetContext>,
    /// Newest first, when history was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<TargetContext>>,
}

const HISTORY_SCAN_LIMIT: usize = 1000;

/// Context-chain use cases.
pub struct ContextService {
    store: Option<Store>,
}

impl ContextService {
    #[must_use]
    pub fn new(store: Option<Store>) -> Self {
        Self { store }
    }

    /// Read the current (or a specific) version, optionally with history.
    ///
    /// # Errors
    ///
    /// Fails when the store is unavailable or a requested version is absent.
    pub async fn get(
        &self,
        target_id: &TargetId,
        version: Option<i32>,
        include_history: bool,
    ) -> Result<ContextView> {
        let store = Store::require(self.store.as_ref())?;
        let current = match version {
            None => store.contexts.current(target_id).await?,
            Some(v) => {
                let found = store
                    .contexts
                    .history(target_id, HISTORY_SCAN_LIMIT)
                    .await?
                    .into_iter()
                    .find(|c| c.version == v);
                Some(found.ok_or_else(|| {
                    Error::not_found(format!("context version {v} for target {target_id}"))
                })?)
            }
        };
        let history = if include_history {
            Some(store.contexts.history(target_id, 50).await?)
        } else {
            None
        };
        Ok(ContextView { current, history })
    }

    /// Append a new version.
    ///
    /// With `append_mode`, provided fields are concatenated onto the previous
    /// version's; otherwise provided fields replace them. Absent fields
    /// always replicate the previous version. The first version simply takes
    /// the provided fields.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` when neither field is provided, and
    /// with `conflict` when a concurrent append wins the race.
    pub async fn update(
        &self,
        target_id: &TargetId,
        user_context: Option<String>,
        agent_context: Option<String>,
        change_summary: Option<String>,
        append_mode: bool,
        created_by: ContextAuthor,
    ) -> Result<TargetContext> {
        if user_context.is_none() && agent_context.is_none() {
            return Err(Error::validation(
                "either user_context or agent_context must be provided",
                vec![
                    FieldError::new("user_context", "missing", None),
                    FieldError::new("agent_context", "missing", None),
                ],
            ));
        }

        let store = Store::require(self.store.as_ref())?;
        let previous = store.contexts.current(target_id).await?;

        let new = match &previous {
            None => NewContextVersion {
                user_context: user_context.unwrap_or_default(),
                agent_context: agent_context.unwrap_or_default(),
                created_by,
                change_summary,
                change_type: Some("create".to_owned()),
                expected_version: None,
            },
            Some(prev) => NewContextVersion {
                user_context: Self::merge(&prev.user_context, user_context, append_mode),
                agent_context: Self::merge(&prev.agent_context, agent_context, append_mode),
                created_by,
                change_summary,
                change_type: Some(if append_mode { "append" } else { "replace" }.to_owned()),
                expected_version: Some(prev.version),
            },
        };

        store.contexts.append(target_id, new).await
    }

    /// Line-oriented diff between two versions.
    ///
    /// # Errors
    ///
    /// Fails when either version does not exist.
    pub async fn diff(&self, a: &ContextId, b: &ContextId) -> Result<ContextDiff> {
        let store = Store::require(self.store.as_ref())?;
        let a = store
            .contexts
            .get(a)
            .await?
            .ok_or_else(|| Error::not_found(format!("context {a}")))?;
        let b = store
            .contexts
            .get(b)
            .await?
            .ok_or_else(|| Error::not_found(format!("context {b}")))?;
        Ok(ContextDiff::between(&a, &b))
    }

    fn merge(previous: &str, provided: Option<String>, append_mode: bool) -> String {
        match provided {
            None => previous.to_owned(),
            Some(new) if append_mode && !previous.is_empty() => {
                format!("{previous}\n\n{new}")
            }
            Some(new) => new,
        }
    }
}
