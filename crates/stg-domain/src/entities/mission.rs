//! Missions: bounded testing engagements and their recorded actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ActionId, MissionId};

/// Lifecycle status of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl MissionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` and `failed` are terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only transitions: active and paused flip freely, any non-terminal into a
    /// terminal state. Terminal states never transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Active, Self::Paused) | (Self::Paused, Self::Active) => true,
            (_, Self::Completed | Self::Failed) => true,
            (a, b) => *a == b,
        }
    }
}

impl_from_str!(MissionStatus, "Unknown mission status: {}", {
    "active" => MissionStatus::Active,
    "paused" => MissionStatus::Paused,
    "completed" => MissionStatus::Completed,
    "failed" => MissionStatus::Failed,
});

/// In/out host patterns bounding a mission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MissionScope {
    /// Host patterns that are in scope
    #[serde(default)]
    pub in_scope: Vec<String>,
    /// Host patterns explicitly out of scope
    #[serde(default)]
    pub out_of_scope: Vec<String>,
}

/// A bounded unit of testing work with a goal and an ordered action stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub name: String,
    /// Embedded for similarity search
    pub goal: String,
    pub hypothesis: Option<String>,
    pub scope: MissionScope,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tri-state outcome of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Success,
    Failure,
    Unknown,
}

impl ActionOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "true",
            Self::Failure => "false",
            Self::Unknown => "unknown",
        }
    }
}

impl_from_str!(ActionOutcome, "Unknown action outcome: {}", {
    "true" => ActionOutcome::Success,
    "false" => ActionOutcome::Failure,
    "success" => ActionOutcome::Success,
    "failure" => ActionOutcome::Failure,
    "unknown" => ActionOutcome::Unknown,
});

/// Immutable record of one logical technique attempt within a mission.
///
/// Ordered by `created_at`, ties broken by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionAction {
    pub id: ActionId,
    pub mission_id: MissionId,
    /// Short technique label; embedded for similarity search
    pub technique: String,
    pub hypothesis: Option<String>,
    /// Observed result; embedded for similarity search
    pub result: String,
    pub outcome: ActionOutcome,
    pub learning: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_transition() {
        assert!(!MissionStatus::Completed.can_transition_to(MissionStatus::Active));
        assert!(!MissionStatus::Failed.can_transition_to(MissionStatus::Paused));
    }

    #[test]
    fn pause_and_resume_are_allowed() {
        assert!(MissionStatus::Active.can_transition_to(MissionStatus::Paused));
        assert!(MissionStatus::Paused.can_transition_to(MissionStatus::Active));
    }

    #[test]
    fn any_nonterminal_state_may_finish() {
        assert!(MissionStatus::Active.can_transition_to(MissionStatus::Completed));
        assert!(MissionStatus::Paused.can_transition_to(MissionStatus::Failed));
    }

    #[test]
    fn outcome_accepts_legacy_spellings() {
        assert_eq!(
            "TRUE".parse::<ActionOutcome>().expect("parse"),
            ActionOutcome::Success
        );
        assert_eq!(
            "failure".parse::<ActionOutcome>().expect("parse"),
            ActionOutcome::Failure
        );
    }
}
