//! Mission repository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::{Mission, MissionScope, MissionStatus};
use stg_domain::error::{Error, Result};
use stg_domain::ports::{MissionRepository, MissionUpdate, NewMission};
use stg_domain::value_objects::{MissionId, TargetId};

use super::{decode_err, embedding_to_vector, parse_enum, query_err};

const COLUMNS: &str = "id, name, goal, hypothesis, scope, status, created_at, completed_at";

pub struct PgMissionRepository {
    pool: PgPool,
}

impl PgMissionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_mission(row: &PgRow) -> Result<Mission> {
    let scope: MissionScope = serde_json::from_value(
        row.try_get::<Value, _>("scope").map_err(decode_err)?,
    )
    .unwrap_or_default();
    Ok(Mission {
        id: MissionId::from_uuid(row.try_get("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        goal: row.try_get("goal").map_err(decode_err)?,
        hypothesis: row.try_get("hypothesis").map_err(decode_err)?,
        scope,
        status: parse_enum(
            row.try_get::<String, _>("status").map_err(decode_err)?.as_str(),
            "status",
        )?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        completed_at: row.try_get("completed_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl MissionRepository for PgMissionRepository {
    async fn create(&self, new: NewMission) -> Result<Mission> {
        let scope = serde_json::to_value(&new.scope)
            .map_err(|e| Error::database_with_source("scope encode failed", e))?;
        let row = sqlx::query(&format!(
            "INSERT INTO missions \
             (id, name, goal, hypothesis, scope, status, goal_embedding, hypothesis_embedding, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.goal)
        .bind(&new.hypothesis)
        .bind(scope)
        .bind(embedding_to_vector(new.goal_embedding.as_ref()))
        .bind(embedding_to_vector(new.hypothesis_embedding.as_ref()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("mission create"))?;
        row_to_mission(&row)
    }

    async fn get(&self, id: &MissionId) -> Result<Option<Mission>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM missions WHERE id = $1"))
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("mission get"))?;
        row.as_ref().map(row_to_mission).transpose()
    }

    async fn update(&self, id: &MissionId, update: MissionUpdate) -> Result<Mission> {
        let row = sqlx::query(&format!(
            "UPDATE missions SET \
             name = COALESCE($2, name), \
             goal = COALESCE($3, goal), \
             hypothesis = COALESCE($4, hypothesis), \
             status = COALESCE($5, status), \
             completed_at = COALESCE($6, completed_at) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id.inner())
        .bind(update.name)
        .bind(update.goal)
        .bind(update.hypothesis)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("mission update"))?;
        let row = row.ok_or_else(|| Error::not_found(format!("mission {id}")))?;
        row_to_mission(&row)
    }

    async fn list(&self, status: Option<MissionStatus>, limit: usize) -> Result<Vec<Mission>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM missions \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("mission list"))?;
        rows.iter().map(row_to_mission).collect()
    }

    async fn associate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()> {
        sqlx::query(
            "INSERT INTO mission_targets (mission_id, target_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(mission_id.inner())
        .bind(target_id.inner())
        .execute(&self.pool)
        .await
        .map_err(query_err("mission target associate"))?;
        Ok(())
    }

    async fn dissociate_target(&self, mission_id: &MissionId, target_id: &TargetId) -> Result<()> {
        sqlx::query("DELETE FROM mission_targets WHERE mission_id = $1 AND target_id = $2")
            .bind(mission_id.inner())
            .bind(target_id.inner())
            .execute(&self.pool)
            .await
            .map_err(query_err("mission target dissociate"))?;
        Ok(())
    }

    async fn targets(&self, mission_id: &MissionId) -> Result<Vec<TargetId>> {
        let rows = sqlx::query("SELECT target_id FROM mission_targets WHERE mission_id = $1")
            .bind(mission_id.inner())
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("mission targets"))?;
        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("target_id")
                    .map(TargetId::from_uuid)
                    .map_err(decode_err)
            })
            .collect()
    }
}
