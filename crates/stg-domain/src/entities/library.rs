//! Curated technique library entries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::EntryId;

/// One curated technique the agent chose to remember.
///
/// Content is embedded for cosine similarity search; usage statistics are
/// maintained on retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, Value>,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics over the technique library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    pub entry_count: i64,
    pub by_category: HashMap<String, i64>,
    /// Most frequent tags, descending by count
    pub top_tags: Vec<(String, i64)>,
}
