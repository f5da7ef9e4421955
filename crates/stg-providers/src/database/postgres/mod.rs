//! Repository implementations over `sqlx` + pgvector.

use std::collections::HashMap;

use serde_json::Value;

use stg_domain::error::{Error, Result};
use stg_domain::value_objects::Embedding;

mod actions;
mod contexts;
mod library;
mod missions;
mod requests;
mod targets;

pub use actions::PgActionRepository;
pub use contexts::PgContextRepository;
pub use library::PgLibraryRepository;
pub use missions::PgMissionRepository;
pub use requests::PgRequestRepository;
pub use targets::PgTargetRepository;

/// Uniform decode-error mapping for `try_get` calls.
pub(crate) fn decode_err(e: sqlx::Error) -> Error {
    Error::database_with_source("row decode failed", e)
}

/// Uniform query-error mapping.
pub(crate) fn query_err(context: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| Error::database_with_source(format!("{context} failed"), e)
}

/// Parse a TEXT enum column through the domain `FromStr`.
pub(crate) fn parse_enum<T>(raw: &str, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| Error::database(format!("bad {column} column: {e}")))
}

pub(crate) fn json_to_string_map(value: Value) -> HashMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect(),
        _ => HashMap::new(),
    }
}

pub(crate) fn json_to_value_map(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

pub(crate) fn string_map_to_json(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

pub(crate) fn value_map_to_json(map: &HashMap<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

pub(crate) fn embedding_to_vector(embedding: Option<&Embedding>) -> Option<pgvector::Vector> {
    embedding.map(|e| pgvector::Vector::from(e.vector.clone()))
}

pub(crate) fn vector_to_embedding(vector: Option<pgvector::Vector>) -> Option<Embedding> {
    vector.map(|v| Embedding::new(v.to_vec()))
}
