use std::sync::Arc;

use crate::services::TicketingService;
use crate::store::Store;

/// Shared across handlers; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub ticketing: TicketingService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            ticketing: TicketingService::new(store),
        }
    }
}
