//! Shared handler state

use crate::chat::{ChatStore, OwnerResolver};
use crate::relay::RelayController;
use std::sync::Arc;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Runs relay requests
    pub controller: Arc<RelayController>,
    /// Chat storage for the history endpoints
    pub store: Arc<dyn ChatStore>,
    /// Identity the history endpoints list for
    pub owners: Arc<dyn OwnerResolver>,
}

impl AppState {
    /// Wire a controller over `store` and `owners`
    pub fn new(
        controller: RelayController,
        store: Arc<dyn ChatStore>,
        owners: Arc<dyn OwnerResolver>,
    ) -> Self {
        Self {
            controller: Arc::new(controller),
            store,
            owners,
        }
    }
}
