//! Context-chain repository.
//!
//! Appends run in one transaction with a `FOR UPDATE` row lock on the owning
//! target, so versions per target are totally ordered. A stale
//! `expected_version` loses with a conflict.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::TargetContext;
use stg_domain::error::{Error, Result};
use stg_domain::ports::{ContextRepository, NewContextVersion};
use stg_domain::value_objects::{ContextId, TargetId};

use super::{decode_err, parse_enum, query_err};

const COLUMNS: &str = "id, target_id, version, parent_version_id, user_context, agent_context, \
                       created_by, change_summary, change_type, created_at";

pub struct PgContextRepository {
    pool: PgPool,
}

impl PgContextRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_context(row: &PgRow) -> Result<TargetContext> {
    Ok(TargetContext {
        id: ContextId::from_uuid(row.try_get("id").map_err(decode_err)?),
        target_id: TargetId::from_uuid(row.try_get("target_id").map_err(decode_err)?),
        version: row.try_get("version").map_err(decode_err)?,
        parent_version_id: row
            .try_get::<Option<Uuid>, _>("parent_version_id")
            .map_err(decode_err)?
            .map(ContextId::from_uuid),
        user_context: row.try_get("user_context").map_err(decode_err)?,
        agent_context: row.try_get("agent_context").map_err(decode_err)?,
        created_by: parse_enum(
            row.try_get::<String, _>("created_by").map_err(decode_err)?.as_str(),
            "created_by",
        )?,
        change_summary: row.try_get("change_summary").map_err(decode_err)?,
        change_type: row.try_get("change_type").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl ContextRepository for PgContextRepository {
    async fn append(&self, target_id: &TargetId, new: NewContextVersion) -> Result<TargetContext> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_err("context append begin"))?;

        // Serialise appends per target.
        let target = sqlx::query("SELECT id FROM targets WHERE id = $1 FOR UPDATE")
            .bind(target_id.inner())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err("context append target lock"))?;
        if target.is_none() {
            return Err(Error::not_found(format!("target {target_id}")));
        }

        let current = sqlx::query(
            "SELECT id, version FROM target_contexts \
             WHERE target_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(target_id.inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_err("context append head read"))?;

        let (parent_id, current_version) = match &current {
            Some(row) => (
                Some(row.try_get::<Uuid, _>("id").map_err(decode_err)?),
                Some(row.try_get::<i32, _>("version").map_err(decode_err)?),
            ),
            None => (None, None),
        };
        if current_version != new.expected_version {
            return Err(Error::conflict(format!(
                "context for target {target_id} is at version {current_version:?}, \
                 append expected {:?}",
                new.expected_version
            )));
        }

        let version = current_version.unwrap_or(0) + 1;
        let row = sqlx::query(&format!(
            "INSERT INTO target_contexts \
             (id, target_id, version, parent_version_id, user_context, agent_context, \
              created_by, change_summary, change_type, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(target_id.inner())
        .bind(version)
        .bind(parent_id)
        .bind(&new.user_context)
        .bind(&new.agent_context)
        .bind(new.created_by.as_str())
        .bind(&new.change_summary)
        .bind(&new.change_type)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                Error::conflict(format!("concurrent context append for target {target_id}"))
            } else {
                Error::database_with_source("context insert failed", e)
            }
        })?;
        let context = row_to_context(&row)?;

        sqlx::query("UPDATE targets SET current_context_id = $2, updated_at = $3 WHERE id = $1")
            .bind(target_id.inner())
            .bind(context.id.inner())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(query_err("context head move"))?;

        tx.commit()
            .await
            .map_err(query_err("context append commit"))?;
        Ok(context)
    }

    async fn current(&self, target_id: &TargetId) -> Result<Option<TargetContext>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM target_contexts \
             WHERE target_id = $1 ORDER BY version DESC LIMIT 1"
        ))
        .bind(target_id.inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("context current"))?;
        row.as_ref().map(row_to_context).transpose()
    }

    async fn history(&self, target_id: &TargetId, limit: usize) -> Result<Vec<TargetContext>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM target_contexts \
             WHERE target_id = $1 ORDER BY version DESC LIMIT $2"
        ))
        .bind(target_id.inner())
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("context history"))?;
        rows.iter().map(row_to_context).collect()
    }

    async fn get(&self, id: &ContextId) -> Result<Option<TargetContext>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM target_contexts WHERE id = $1"))
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("context get"))?;
        row.as_ref().map(row_to_context).transpose()
    }
}
