//! HTTP request repository.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::HttpRequestRecord;
use stg_domain::error::Result;
use stg_domain::ports::{NewHttpRequest, RequestRepository, RequestSearch};
use stg_domain::value_objects::{ActionId, MissionId, RequestId, TargetId};

use super::{decode_err, json_to_string_map, parse_enum, query_err, string_map_to_json};

const COLUMNS: &str = "id, method, url, final_url, host, path, query_params, request_headers, \
                       request_cookies, request_body, request_body_size, status_code, \
                       response_headers, response_body, response_body_size, elapsed_ms, error, \
                       target_id, action_id, created_at";

pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_request(row: &PgRow) -> Result<HttpRequestRecord> {
    Ok(HttpRequestRecord {
        id: RequestId::from_uuid(row.try_get("id").map_err(decode_err)?),
        method: parse_enum(
            row.try_get::<String, _>("method").map_err(decode_err)?.as_str(),
            "method",
        )?,
        url: row.try_get("url").map_err(decode_err)?,
        final_url: row.try_get("final_url").map_err(decode_err)?,
        host: row.try_get("host").map_err(decode_err)?,
        path: row.try_get("path").map_err(decode_err)?,
        query_params: json_to_string_map(row.try_get::<Value, _>("query_params").map_err(decode_err)?),
        request_headers: json_to_string_map(
            row.try_get::<Value, _>("request_headers").map_err(decode_err)?,
        ),
        request_cookies: json_to_string_map(
            row.try_get::<Value, _>("request_cookies").map_err(decode_err)?,
        ),
        request_body: row.try_get("request_body").map_err(decode_err)?,
        request_body_size: row.try_get("request_body_size").map_err(decode_err)?,
        status_code: row.try_get("status_code").map_err(decode_err)?,
        response_headers: json_to_string_map(
            row.try_get::<Value, _>("response_headers").map_err(decode_err)?,
        ),
        response_body: row.try_get("response_body").map_err(decode_err)?,
        response_body_size: row.try_get("response_body_size").map_err(decode_err)?,
        elapsed_ms: row.try_get("elapsed_ms").map_err(decode_err)?,
        error: row.try_get("error").map_err(decode_err)?,
        target_id: row
            .try_get::<Option<Uuid>, _>("target_id")
            .map_err(decode_err)?
            .map(TargetId::from_uuid),
        action_id: row
            .try_get::<Option<Uuid>, _>("action_id")
            .map_err(decode_err)?
            .map(ActionId::from_uuid),
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl RequestRepository for PgRequestRepository {
    async fn insert(&self, new: NewHttpRequest) -> Result<HttpRequestRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO http_requests \
             (id, method, url, final_url, host, path, query_params, request_headers, \
              request_cookies, request_body, request_body_size, status_code, response_headers, \
              response_body, response_body_size, elapsed_ms, error, target_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.method.as_str())
        .bind(&new.url)
        .bind(&new.final_url)
        .bind(&new.host)
        .bind(&new.path)
        .bind(string_map_to_json(&new.query_params))
        .bind(string_map_to_json(&new.request_headers))
        .bind(string_map_to_json(&new.request_cookies))
        .bind(&new.request_body)
        .bind(new.request_body_size)
        .bind(new.status_code)
        .bind(string_map_to_json(&new.response_headers))
        .bind(&new.response_body)
        .bind(new.response_body_size)
        .bind(new.elapsed_ms)
        .bind(&new.error)
        .bind(new.target_id.map(|t| t.inner()))
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("request insert"))?;
        row_to_request(&row)
    }

    async fn get(&self, id: &RequestId) -> Result<Option<HttpRequestRecord>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM http_requests WHERE id = $1"))
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("request get"))?;
        row.as_ref().map(row_to_request).transpose()
    }

    async fn link_to_action(&self, request_id: &RequestId, action_id: &ActionId) -> Result<()> {
        sqlx::query("UPDATE http_requests SET action_id = $2 WHERE id = $1")
            .bind(request_id.inner())
            .bind(action_id.inner())
            .execute(&self.pool)
            .await
            .map_err(query_err("request action link"))?;
        Ok(())
    }

    async fn recent_for_mission(
        &self,
        mission_id: &MissionId,
        count: usize,
    ) -> Result<Vec<HttpRequestRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM http_requests r \
             JOIN mission_actions a ON r.action_id = a.id \
             WHERE a.mission_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC LIMIT $2",
            COLUMNS
                .split(", ")
                .map(|c| format!("r.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(mission_id.inner())
        .bind(count.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("recent requests for mission"))?;
        rows.iter().map(row_to_request).collect()
    }

    async fn list(&self, filter: &RequestSearch) -> Result<Vec<HttpRequestRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM http_requests \
             WHERE ($1::uuid IS NULL OR target_id = $1) \
             AND ($2::text IS NULL OR host = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        ))
        .bind(filter.target_id.map(|t| t.inner()))
        .bind(filter.host.as_deref())
        .bind(filter.limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("request list"))?;
        rows.iter().map(row_to_request).collect()
    }
}
