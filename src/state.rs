use std::sync::Arc;

use crate::scheduling::QueryPlanner;
use crate::store::EventStore;

/// Shared handler state: the injected data-store collaborator.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub fn planner(&self) -> QueryPlanner<dyn EventStore> {
        QueryPlanner::new(Arc::clone(&self.store))
    }
}
