//! Mission action repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::MissionAction;
use stg_domain::error::Result;
use stg_domain::ports::{ActionRepository, ActionSearch, NewAction};
use stg_domain::value_objects::{ActionId, Embedding, MissionId};

use super::{decode_err, embedding_to_vector, parse_enum, query_err};

const COLUMNS: &str =
    "id, mission_id, technique, hypothesis, result, success, learning, created_at";

pub struct PgActionRepository {
    pool: PgPool,
}

impl PgActionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_action(row: &PgRow) -> Result<MissionAction> {
    Ok(MissionAction {
        id: ActionId::from_uuid(row.try_get("id").map_err(decode_err)?),
        mission_id: MissionId::from_uuid(row.try_get("mission_id").map_err(decode_err)?),
        technique: row.try_get("technique").map_err(decode_err)?,
        hypothesis: row.try_get("hypothesis").map_err(decode_err)?,
        result: row.try_get("result").map_err(decode_err)?,
        outcome: parse_enum(
            row.try_get::<String, _>("success").map_err(decode_err)?.as_str(),
            "success",
        )?,
        learning: row.try_get("learning").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl ActionRepository for PgActionRepository {
    async fn append(&self, new: NewAction) -> Result<MissionAction> {
        let row = sqlx::query(&format!(
            "INSERT INTO mission_actions \
             (id, mission_id, technique, hypothesis, result, success, learning, \
              action_embedding, result_embedding, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.mission_id.inner())
        .bind(&new.technique)
        .bind(&new.hypothesis)
        .bind(&new.result)
        .bind(new.outcome.as_str())
        .bind(&new.learning)
        .bind(embedding_to_vector(new.action_embedding.as_ref()))
        .bind(embedding_to_vector(new.result_embedding.as_ref()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("action append"))?;
        row_to_action(&row)
    }

    async fn latest(&self, mission_id: &MissionId) -> Result<Option<MissionAction>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM mission_actions \
             WHERE mission_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(mission_id.inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("action latest"))?;
        row.as_ref().map(row_to_action).transpose()
    }

    async fn list_for_mission(
        &self,
        mission_id: &MissionId,
        limit: usize,
    ) -> Result<Vec<MissionAction>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM mission_actions \
             WHERE mission_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(mission_id.inner())
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("action list"))?;
        rows.iter().map(row_to_action).collect()
    }

    async fn search(&self, filter: &ActionSearch) -> Result<Vec<MissionAction>> {
        let rows = sqlx::query(&format!(
            "SELECT a.id, a.mission_id, a.technique, a.hypothesis, a.result, a.success, \
                    a.learning, a.created_at \
             FROM mission_actions a JOIN missions m ON m.id = a.mission_id \
             WHERE ($1::uuid IS NULL OR a.mission_id = $1) \
             AND ($2::text IS NULL OR m.status = $2) \
             AND ($3::text IS NULL OR a.technique ILIKE '%' || $3 || '%') \
             AND ($4::text IS NULL OR a.technique = $4) \
             AND (NOT $5 OR a.success = 'true') \
             ORDER BY a.created_at DESC, a.id DESC LIMIT $6"
        ))
        .bind(filter.mission_id.map(|m| m.inner()))
        .bind(filter.mission_status.map(|s| s.as_str()))
        .bind(filter.technique_substring.as_deref())
        .bind(filter.technique_exact.as_deref())
        .bind(filter.success_only)
        .bind(filter.limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("action search"))?;
        rows.iter().map(row_to_action).collect()
    }

    async fn find_similar(
        &self,
        query: &Embedding,
        mission_id: Option<&MissionId>,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(MissionAction, f32)>> {
        let vector = pgvector::Vector::from(query.vector.clone());
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS}, 1 - (action_embedding <=> $1) AS score \
             FROM mission_actions \
             WHERE action_embedding IS NOT NULL \
             AND ($2::uuid IS NULL OR mission_id = $2) \
             ORDER BY action_embedding <=> $1 LIMIT $3"
        ))
        .bind(vector)
        .bind(mission_id.map(|m| m.inner()))
        .bind(k.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("action similarity search"))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let score: f64 = row.try_get("score").map_err(decode_err)?;
            let score = score as f32;
            if score >= min_similarity {
                scored.push((row_to_action(row)?, score));
            }
        }
        Ok(scored)
    }
}
