//! Target repository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::Target;
use stg_domain::error::{Error, Result};
use stg_domain::ports::{TargetDefaults, TargetRepository, TargetSearch, TargetUpdate};
use stg_domain::value_objects::{ContextId, TargetId, TargetKey};

use super::{decode_err, json_to_value_map, parse_enum, query_err, value_map_to_json};

const COLUMNS: &str = "id, host, port, protocol, title, status, risk_level, metadata, \
                       current_context_id, last_activity, created_at, updated_at";

pub struct PgTargetRepository {
    pool: PgPool,
}

impl PgTargetRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(super) fn row_to_target(row: &PgRow) -> Result<Target> {
    Ok(Target {
        id: TargetId::from_uuid(row.try_get("id").map_err(decode_err)?),
        host: row.try_get("host").map_err(decode_err)?,
        port: row
            .try_get::<Option<i32>, _>("port")
            .map_err(decode_err)?
            .map(|p| p as u16),
        protocol: parse_enum(row.try_get::<String, _>("protocol").map_err(decode_err)?.as_str(), "protocol")?,
        title: row.try_get("title").map_err(decode_err)?,
        status: parse_enum(row.try_get::<String, _>("status").map_err(decode_err)?.as_str(), "status")?,
        risk_level: parse_enum(
            row.try_get::<String, _>("risk_level").map_err(decode_err)?.as_str(),
            "risk_level",
        )?,
        metadata: json_to_value_map(row.try_get::<Value, _>("metadata").map_err(decode_err)?),
        current_context_id: row
            .try_get::<Option<Uuid>, _>("current_context_id")
            .map_err(decode_err)?
            .map(ContextId::from_uuid),
        last_activity: row.try_get("last_activity").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl TargetRepository for PgTargetRepository {
    async fn upsert(&self, key: &TargetKey, defaults: TargetDefaults) -> Result<(Target, bool)> {
        let now = Utc::now();
        let inserted = sqlx::query(&format!(
            "INSERT INTO targets \
             (id, host, port, protocol, title, status, risk_level, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
             ON CONFLICT (host, protocol, (COALESCE(port, -1))) DO NOTHING \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&key.host)
        .bind(key.port.map(i32::from))
        .bind(key.protocol.as_str())
        .bind(&defaults.title)
        .bind(defaults.status.as_str())
        .bind(defaults.risk_level.as_str())
        .bind(value_map_to_json(&defaults.metadata))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("target upsert"))?;

        if let Some(row) = inserted {
            return Ok((row_to_target(&row)?, true));
        }

        // Lost the insert race or the triple already existed; return the
        // existing row unchanged.
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM targets \
             WHERE host = $1 AND protocol = $2 AND COALESCE(port, -1) = COALESCE($3, -1)"
        ))
        .bind(&key.host)
        .bind(key.protocol.as_str())
        .bind(key.port.map(i32::from))
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("target lookup after conflict"))?;
        Ok((row_to_target(&row)?, false))
    }

    async fn get(&self, id: &TargetId) -> Result<Option<Target>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM targets WHERE id = $1"))
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("target get"))?;
        row.as_ref().map(row_to_target).transpose()
    }

    async fn update_fields(&self, id: &TargetId, update: TargetUpdate) -> Result<Target> {
        let row = sqlx::query(&format!(
            "UPDATE targets SET \
             status = COALESCE($2, status), \
             risk_level = COALESCE($3, risk_level), \
             title = COALESCE($4, title), \
             metadata = metadata || COALESCE($5, '{{}}'::jsonb), \
             updated_at = $6 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id.inner())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.risk_level.map(|r| r.as_str()))
        .bind(update.title)
        .bind(update.metadata.as_ref().map(value_map_to_json))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("target update"))?;
        let row = row.ok_or_else(|| Error::not_found(format!("target {id}")))?;
        row_to_target(&row)
    }

    async fn search(&self, filter: &TargetSearch) -> Result<Vec<Target>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM targets \
             WHERE ($1::text IS NULL OR host ILIKE '%' || $1 || '%' OR title ILIKE '%' || $1 || '%') \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::text IS NULL OR risk_level = $3) \
             AND ($4::text IS NULL OR protocol = $4) \
             ORDER BY last_activity DESC NULLS LAST, created_at DESC \
             LIMIT $5"
        ))
        .bind(filter.query.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.risk_level.map(|r| r.as_str()))
        .bind(filter.protocol.map(|p| p.as_str()))
        .bind(filter.limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("target search"))?;
        rows.iter().map(row_to_target).collect()
    }

    async fn touch_activity(&self, id: &TargetId, at: chrono::DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE targets SET last_activity = $2 WHERE id = $1")
            .bind(id.inner())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(query_err("target activity bump"))?;
        Ok(())
    }

    async fn request_count(&self, id: &TargetId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM http_requests WHERE target_id = $1")
            .bind(id.inner())
            .fetch_one(&self.pool)
            .await
            .map_err(query_err("request count"))?;
        row.try_get("n").map_err(decode_err)
    }
}
