//! Repository aggregate handed to services at bootstrap.

use std::sync::Arc;

use stg_domain::error::{Error, Result};
use stg_domain::ports::{
    ActionRepository, ContextRepository, LibraryRepository, MissionRepository, RequestRepository,
    TargetRepository,
};

/// All repositories over one backing database.
///
/// The gateway runs with `None` when no `DATABASE_URL` is configured;
/// store-dependent operations then fail with `store_unavailable` while HTTP
/// execution keeps working without logging.
#[derive(Clone)]
pub struct Store {
    pub targets: Arc<dyn TargetRepository>,
    pub contexts: Arc<dyn ContextRepository>,
    pub missions: Arc<dyn MissionRepository>,
    pub actions: Arc<dyn ActionRepository>,
    pub requests: Arc<dyn RequestRepository>,
    pub library: Arc<dyn LibraryRepository>,
}

impl Store {
    /// Unwrap an optional store, failing with `store_unavailable`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] when the store is not configured.
    pub fn require(store: Option<&Store>) -> Result<&Store> {
        store.ok_or_else(|| Error::store_unavailable("no database configured (set DATABASE_URL)"))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
