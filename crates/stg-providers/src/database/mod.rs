//! Postgres persistence.
//!
//! One repository struct per domain port over a shared [`PgPool`]. The
//! schema is bootstrapped idempotently at connect time; vector columns use
//! the pgvector extension with IVFFlat cosine indexes.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use stg_domain::error::{Error, Result};

/// Repository implementations
pub mod postgres;

pub use postgres::{
    PgActionRepository, PgContextRepository, PgLibraryRepository, PgMissionRepository,
    PgRequestRepository, PgTargetRepository,
};

/// Connect and bootstrap the schema.
///
/// # Errors
///
/// Fails when the database is unreachable or DDL fails.
pub async fn connect(database_url: &str, dimensions: usize) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| Error::database_with_source("failed to connect to Postgres", e))?;
    init_schema(&pool, dimensions).await?;
    info!(dimensions, "store initialised");
    Ok(pool)
}

/// Idempotent DDL: tables, unique keys, btree and IVFFlat indexes.
///
/// # Errors
///
/// Fails when a DDL statement is rejected.
pub async fn init_schema(pool: &PgPool, dimensions: usize) -> Result<()> {
    let statements = vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_owned(),
        r"
        CREATE TABLE IF NOT EXISTS targets (
            id UUID PRIMARY KEY,
            host TEXT NOT NULL,
            port INTEGER,
            protocol TEXT NOT NULL,
            title TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            risk_level TEXT NOT NULL DEFAULT 'medium',
            metadata JSONB NOT NULL DEFAULT '{}',
            current_context_id UUID,
            last_activity TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "
        .to_owned(),
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_targets_key
         ON targets (host, protocol, (COALESCE(port, -1)))"
            .to_owned(),
        r"
        CREATE TABLE IF NOT EXISTS target_contexts (
            id UUID PRIMARY KEY,
            target_id UUID NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
            version INTEGER NOT NULL,
            parent_version_id UUID REFERENCES target_contexts(id),
            user_context TEXT NOT NULL DEFAULT '',
            agent_context TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL,
            change_summary TEXT,
            change_type TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (target_id, version)
        )
        "
        .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_target_contexts_recent
         ON target_contexts (target_id, created_at DESC)"
            .to_owned(),
        format!(
            r"
            CREATE TABLE IF NOT EXISTS missions (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                goal TEXT NOT NULL,
                hypothesis TEXT,
                scope JSONB NOT NULL DEFAULT '{{}}',
                status TEXT NOT NULL DEFAULT 'active',
                goal_embedding vector({dimensions}),
                hypothesis_embedding vector({dimensions}),
                created_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ
            )
            "
        ),
        r"
        CREATE TABLE IF NOT EXISTS mission_targets (
            mission_id UUID NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
            target_id UUID NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
            PRIMARY KEY (mission_id, target_id)
        )
        "
        .to_owned(),
        format!(
            r"
            CREATE TABLE IF NOT EXISTS mission_actions (
                id UUID PRIMARY KEY,
                mission_id UUID NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
                technique TEXT NOT NULL,
                hypothesis TEXT,
                result TEXT NOT NULL,
                success TEXT NOT NULL DEFAULT 'unknown',
                learning TEXT,
                action_embedding vector({dimensions}),
                result_embedding vector({dimensions}),
                created_at TIMESTAMPTZ NOT NULL
            )
            "
        ),
        "CREATE INDEX IF NOT EXISTS idx_mission_actions_recent
         ON mission_actions (mission_id, created_at DESC, id DESC)"
            .to_owned(),
        r"
        CREATE TABLE IF NOT EXISTS http_requests (
            id UUID PRIMARY KEY,
            method TEXT NOT NULL,
            url TEXT NOT NULL,
            final_url TEXT NOT NULL,
            host TEXT,
            path TEXT,
            query_params JSONB NOT NULL DEFAULT '{}',
            request_headers JSONB NOT NULL DEFAULT '{}',
            request_cookies JSONB NOT NULL DEFAULT '{}',
            request_body TEXT,
            request_body_size BIGINT,
            status_code INTEGER,
            response_headers JSONB NOT NULL DEFAULT '{}',
            response_body TEXT,
            response_body_size BIGINT,
            elapsed_ms BIGINT,
            error TEXT,
            target_id UUID REFERENCES targets(id) ON DELETE SET NULL,
            action_id UUID REFERENCES mission_actions(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "
        .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_http_requests_host
         ON http_requests (host, created_at)"
            .to_owned(),
        format!(
            r"
            CREATE TABLE IF NOT EXISTS technique_library (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT[] NOT NULL DEFAULT '{{}}',
                metadata JSONB NOT NULL DEFAULT '{{}}',
                content_embedding vector({dimensions}),
                usage_count BIGINT NOT NULL DEFAULT 0,
                last_used_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL
            )
            "
        ),
        "CREATE INDEX IF NOT EXISTS idx_missions_goal_embedding
         ON missions USING ivfflat (goal_embedding vector_cosine_ops) WITH (lists = 100)"
            .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_missions_hypothesis_embedding
         ON missions USING ivfflat (hypothesis_embedding vector_cosine_ops) WITH (lists = 100)"
            .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_actions_action_embedding
         ON mission_actions USING ivfflat (action_embedding vector_cosine_ops) WITH (lists = 100)"
            .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_actions_result_embedding
         ON mission_actions USING ivfflat (result_embedding vector_cosine_ops) WITH (lists = 100)"
            .to_owned(),
        "CREATE INDEX IF NOT EXISTS idx_library_content_embedding
         ON technique_library USING ivfflat (content_embedding vector_cosine_ops) WITH (lists = 100)"
            .to_owned(),
    ];

    for statement in statements {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| Error::database_with_source("schema bootstrap failed", e))?;
    }
    Ok(())
}
