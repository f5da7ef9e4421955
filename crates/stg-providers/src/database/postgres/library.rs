//! Technique library repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stg_domain::entities::{LibraryEntry, LibraryStats};
use stg_domain::error::Result;
use stg_domain::ports::{LibraryRepository, NewLibraryEntry};
use stg_domain::value_objects::{Embedding, EntryId};

use super::{decode_err, embedding_to_vector, json_to_value_map, query_err, value_map_to_json};

const COLUMNS: &str =
    "id, title, content, category, tags, metadata, usage_count, last_used_at, created_at";

pub struct PgLibraryRepository {
    pool: PgPool,
}

impl PgLibraryRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &PgRow) -> Result<LibraryEntry> {
    Ok(LibraryEntry {
        id: EntryId::from_uuid(row.try_get("id").map_err(decode_err)?),
        title: row.try_get("title").map_err(decode_err)?,
        content: row.try_get("content").map_err(decode_err)?,
        category: row.try_get("category").map_err(decode_err)?,
        tags: row.try_get("tags").map_err(decode_err)?,
        metadata: json_to_value_map(row.try_get::<Value, _>("metadata").map_err(decode_err)?),
        usage_count: row.try_get("usage_count").map_err(decode_err)?,
        last_used_at: row.try_get("last_used_at").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl LibraryRepository for PgLibraryRepository {
    async fn add(&self, new: NewLibraryEntry) -> Result<LibraryEntry> {
        let row = sqlx::query(&format!(
            "INSERT INTO technique_library \
             (id, title, content, category, tags, metadata, content_embedding, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.category)
        .bind(&new.tags)
        .bind(value_map_to_json(&new.metadata))
        .bind(embedding_to_vector(new.content_embedding.as_ref()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("library add"))?;
        row_to_entry(&row)
    }

    async fn get(&self, id: &EntryId) -> Result<Option<LibraryEntry>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM technique_library WHERE id = $1"))
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("library get"))?;
        row.as_ref().map(row_to_entry).transpose()
    }

    async fn search_by_vector(
        &self,
        query: &Embedding,
        k: usize,
        min_similarity: f32,
        category: Option<&str>,
    ) -> Result<Vec<(LibraryEntry, f32)>> {
        let vector = pgvector::Vector::from(query.vector.clone());
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS}, 1 - (content_embedding <=> $1) AS score \
             FROM technique_library \
             WHERE content_embedding IS NOT NULL \
             AND ($2::text IS NULL OR category = $2) \
             ORDER BY content_embedding <=> $1 LIMIT $3"
        ))
        .bind(vector)
        .bind(category)
        .bind(k.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("library similarity search"))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let score: f64 = row.try_get("score").map_err(decode_err)?;
            let score = score as f32;
            if score >= min_similarity {
                scored.push((row_to_entry(row)?, score));
            }
        }
        Ok(scored)
    }

    async fn record_usage(&self, ids: &[EntryId]) -> Result<()> {
        let raw: Vec<Uuid> = ids.iter().map(|id| id.inner()).collect();
        sqlx::query(
            "UPDATE technique_library \
             SET usage_count = usage_count + 1, last_used_at = $2 \
             WHERE id = ANY($1)",
        )
        .bind(&raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_err("library usage bump"))?;
        Ok(())
    }

    async fn stats(&self) -> Result<LibraryStats> {
        let total = sqlx::query("SELECT COUNT(*) AS n FROM technique_library")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err("library count"))?;
        let entry_count: i64 = total.try_get("n").map_err(decode_err)?;

        let category_rows =
            sqlx::query("SELECT category, COUNT(*) AS n FROM technique_library GROUP BY category")
                .fetch_all(&self.pool)
                .await
                .map_err(query_err("library category stats"))?;
        let mut by_category = HashMap::new();
        for row in &category_rows {
            by_category.insert(
                row.try_get::<String, _>("category").map_err(decode_err)?,
                row.try_get::<i64, _>("n").map_err(decode_err)?,
            );
        }

        let tag_rows = sqlx::query(
            "SELECT t.tag, COUNT(*) AS n \
             FROM technique_library, LATERAL UNNEST(tags) AS t(tag) \
             GROUP BY t.tag ORDER BY n DESC, t.tag LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("library tag stats"))?;
        let mut top_tags = Vec::with_capacity(tag_rows.len());
        for row in &tag_rows {
            top_tags.push((
                row.try_get::<String, _>("tag").map_err(decode_err)?,
                row.try_get::<i64, _>("n").map_err(decode_err)?,
            ));
        }

        Ok(LibraryStats {
            entry_count,
            by_category,
            top_tags,
        })
    }
}
