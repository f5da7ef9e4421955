//! Immutable, versioned target context chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ContextId, TargetId};

/// Who authored a context version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContextAuthor {
    User,
    Agent,
    System,
}

impl ContextAuthor {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl_from_str!(ContextAuthor, "Unknown context author: {}", {
    "user" => ContextAuthor::User,
    "agent" => ContextAuthor::Agent,
    "system" => ContextAuthor::System,
});

/// One immutable version in a target's context chain.
///
/// Versions are monotone from 1 with no gaps; `parent_version_id` is null
/// only for version 1. The owning target's `current_context_id` points at the
/// newest version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetContext {
    pub id: ContextId,
    pub target_id: TargetId,
    pub version: i32,
    pub parent_version_id: Option<ContextId>,
    /// Human-authored notes; may be empty but not together with `agent_context`
    pub user_context: String,
    /// Agent-authored notes
    pub agent_context: String,
    pub created_by: ContextAuthor,
    pub change_summary: Option<String>,
    pub change_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Line-oriented additions/removals for one context field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl FieldDiff {
    fn between(old: &str, new: &str) -> Self {
        let old_lines: Vec<&str> = old.lines().collect();
        let new_lines: Vec<&str> = new.lines().collect();
        Self {
            added: new_lines
                .iter()
                .filter(|l| !old_lines.contains(l))
                .map(|l| (*l).to_owned())
                .collect(),
            removed: old_lines
                .iter()
                .filter(|l| !new_lines.contains(l))
                .map(|l| (*l).to_owned())
                .collect(),
        }
    }
}

/// Per-field diff between two context versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextDiff {
    pub user_context: FieldDiff,
    pub agent_context: FieldDiff,
}

impl ContextDiff {
    /// Line-set diff from `a` (older) to `b` (newer).
    #[must_use]
    pub fn between(a: &TargetContext, b: &TargetContext) -> Self {
        Self {
            user_context: FieldDiff::between(&a.user_context, &b.user_context),
            agent_context: FieldDiff::between(&a.agent_context, &b.agent_context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(user: &str, agent: &str) -> TargetContext {
        TargetContext {
            id: ContextId::new(),
            target_id: TargetId::new(),
            version: 1,
            parent_version_id: None,
            user_context: user.to_owned(),
            agent_context: agent.to_owned(),
            created_by: ContextAuthor::Agent,
            change_summary: None,
            change_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn diff_reports_added_and_removed_lines_per_field() {
        let a = version("keep\ndrop me", "agent line");
        let b = version("keep\nfresh", "agent line");
        let diff = ContextDiff::between(&a, &b);
        assert_eq!(diff.user_context.added, vec!["fresh"]);
        assert_eq!(diff.user_context.removed, vec!["drop me"]);
        assert!(diff.agent_context.added.is_empty());
        assert!(diff.agent_context.removed.is_empty());
    }
}
