//! Core business entities with identity.

/// Versioned target context chain
pub mod context;
/// Curated technique library entries
pub mod library;
/// Missions and recorded actions
pub mod mission;
/// Persisted HTTP request records
pub mod request;
/// Targets under test
pub mod target;

pub use context::{ContextAuthor, ContextDiff, FieldDiff, TargetContext};
pub use library::{LibraryEntry, LibraryStats};
pub use mission::{ActionOutcome, Mission, MissionAction, MissionScope, MissionStatus};
pub use request::{HttpMethod, HttpRequestRecord};
pub use target::{RiskLevel, Target, TargetStatus};
