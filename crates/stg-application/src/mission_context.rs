//! Per-connection active mission state.
//!
//! One instance is bound to each agent connection; instances never share
//! state. Readers (the executor's logging path) take a consistent snapshot
//! via an atomic swap of an immutable record, so no lock is held across
//! suspension points.

use std::sync::Arc;

use arc_swap::ArcSwap;
use stg_domain::value_objects::MissionId;

/// Immutable view of the connection's active mission and cookie profile.
#[derive(Debug, Clone, Default)]
pub struct MissionContextSnapshot {
    pub mission_id: Option<MissionId>,
    /// Name as of the last `set`; resolved fresh from the store when shown
    pub mission_name: Option<String>,
    pub cookie_profile: Option<String>,
}

/// Atomic holder for the connection's mission context.
#[derive(Debug, Default)]
pub struct MissionContext {
    current: ArcSwap<MissionContextSnapshot>,
}

impl MissionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active mission; a `None` cookie profile keeps the current one.
    pub fn set(&self, mission_id: MissionId, mission_name: String, cookie_profile: Option<String>) {
        let previous = self.current.load();
        let cookie_profile = cookie_profile.or_else(|| previous.cookie_profile.clone());
        self.current.store(Arc::new(MissionContextSnapshot {
            mission_id: Some(mission_id),
            mission_name: Some(mission_name),
            cookie_profile,
        }));
    }

    /// Reset both the active mission and the cookie profile.
    pub fn clear(&self) {
        self.current.store(Arc::new(MissionContextSnapshot::default()));
    }

    /// Consistent point-in-time view.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MissionContextSnapshot> {
        self.current.load_full()
    }

    /// Explicit value wins; falls back to the active mission.
    #[must_use]
    pub fn resolve_mission(&self, explicit: Option<MissionId>) -> Option<MissionId> {
        explicit.or(self.current.load().mission_id)
    }

    /// Explicit value wins; falls back to the active cookie profile.
    #[must_use]
    pub fn resolve_cookie_profile(&self, explicit: Option<String>) -> Option<String> {
        explicit.or_else(|| self.current.load().cookie_profile.clone())
    }
}
