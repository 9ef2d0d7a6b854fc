//! Shared application state for API handlers.

use std::sync::Arc;
use std::time::SystemTime;

use crate::store::EventStore;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event store all listings are read from.
    pub store: Arc<dyn EventStore>,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new AppState instance.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            start_time: SystemTime::now(),
        }
    }
}
