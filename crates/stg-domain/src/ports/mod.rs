//! Port interfaces implemented by the provider and infrastructure layers.

/// External provider ports (embedding, HTTP transport, cookie profiles)
pub mod providers;
/// Persistence ports, one trait per entity group
pub mod repositories;

pub use providers::{
    CookieProfile, CookieProfileInfo, CookieProfileSource, EmbeddingProvider, HttpTransport,
    TransferFailure, TransferFailureKind, TransferOutcome, TransferRequest,
};
pub use repositories::{
    ActionRepository, ActionSearch, ContextRepository, LibraryRepository, MissionRepository,
    MissionUpdate, NewAction, NewContextVersion, NewHttpRequest, NewLibraryEntry, NewMission,
    RequestRepository, RequestSearch, TargetDefaults, TargetRepository, TargetSearch, TargetUpdate,
};
