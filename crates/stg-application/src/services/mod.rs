//! Entity services backing the tool surface.
//!
//! Each service orchestrates repositories and providers through domain
//! ports; tool handlers stay thin.

/// Versioned context read/write
pub mod context_service;
/// Library curation and similarity search
pub mod library_service;
/// Mission lifecycle, actions and technique search
pub mod mission_service;
/// Target CRUD and summaries
pub mod target_service;

pub use context_service::{ContextService, ContextView};
pub use library_service::LibraryService;
pub use mission_service::{MissionContextInfo, MissionOverview, MissionService, TechniqueStats};
pub use target_service::{TargetService, TargetSummary};
