//! Target entities: hosts under test and their lifecycle state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::{ContextId, Protocol, TargetId, TargetKey};

/// Lifecycle status of a target.
///
/// `blocked` and `completed` end the engagement but stay recoverable to
/// `active` by explicit update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Active,
    Inactive,
    Blocked,
    Completed,
}

impl TargetStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
        }
    }

    /// active and inactive flip freely and may enter blocked or completed;
    /// blocked and completed recover only to active.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Active | Self::Inactive, _) => true,
            (Self::Blocked | Self::Completed, Self::Active) => true,
            (a, b) => *a == b,
        }
    }
}

impl_from_str!(TargetStatus, "Unknown target status: {}", {
    "active" => TargetStatus::Active,
    "inactive" => TargetStatus::Inactive,
    "blocked" => TargetStatus::Blocked,
    "completed" => TargetStatus::Completed,
});

/// Assessed risk of testing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl_from_str!(RiskLevel, "Unknown risk level: {}", {
    "low" => RiskLevel::Low,
    "medium" => RiskLevel::Medium,
    "high" => RiskLevel::High,
    "critical" => RiskLevel::Critical,
});

/// A host/port/protocol triple under test.
///
/// Created explicitly by a tool or implicitly on the first request to a new
/// triple; never deleted by the gateway itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub host: String,
    pub port: Option<u16>,
    pub protocol: Protocol,
    pub title: Option<String>,
    pub status: TargetStatus,
    pub risk_level: RiskLevel,
    /// Free-form key to scalar metadata
    pub metadata: HashMap<String, Value>,
    /// Head of the immutable context-version chain
    pub current_context_id: Option<ContextId>,
    /// Bumped by the logging pipeline on every persisted request
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// The normalised key identifying this target.
    #[must_use]
    pub fn key(&self) -> TargetKey {
        TargetKey::new(&self.host, self.port, self.protocol)
    }

    /// Scheme://host[:port] derived from the triple.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.key().base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_inactive_flip_freely() {
        assert!(TargetStatus::Active.can_transition_to(TargetStatus::Inactive));
        assert!(TargetStatus::Inactive.can_transition_to(TargetStatus::Active));
    }

    #[test]
    fn either_working_state_may_end_the_engagement() {
        assert!(TargetStatus::Active.can_transition_to(TargetStatus::Blocked));
        assert!(TargetStatus::Active.can_transition_to(TargetStatus::Completed));
        assert!(TargetStatus::Inactive.can_transition_to(TargetStatus::Blocked));
        assert!(TargetStatus::Inactive.can_transition_to(TargetStatus::Completed));
    }

    #[test]
    fn ended_targets_recover_only_to_active() {
        assert!(TargetStatus::Blocked.can_transition_to(TargetStatus::Active));
        assert!(TargetStatus::Completed.can_transition_to(TargetStatus::Active));
        assert!(!TargetStatus::Blocked.can_transition_to(TargetStatus::Completed));
        assert!(!TargetStatus::Completed.can_transition_to(TargetStatus::Blocked));
        assert!(!TargetStatus::Blocked.can_transition_to(TargetStatus::Inactive));
        assert!(!TargetStatus::Completed.can_transition_to(TargetStatus::Inactive));
    }

    #[test]
    fn same_state_updates_are_no_ops() {
        assert!(TargetStatus::Blocked.can_transition_to(TargetStatus::Blocked));
        assert!(TargetStatus::Completed.can_transition_to(TargetStatus::Completed));
    }
}
