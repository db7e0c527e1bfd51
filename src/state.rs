//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the document store every session reads and writes, the
//! process-local presence table, and the per-session sync settings. Live
//! editing state is not shared: each websocket task owns its `Session`.

use std::sync::Arc;

use crate::services::presentation::Presence;
use crate::services::sync::SyncConfig;
use crate::store::DocumentStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub presence: Arc<Presence>,
    pub sync: SyncConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, sync: SyncConfig) -> Self {
        Self { store, presence: Arc::new(Presence::new()), sync }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
