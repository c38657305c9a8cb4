use std::sync::Arc;

use crate::config::Config;
use crate::store::ReviewStore;
use crate::upload::orchestrator::ReviewService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReviewService>,
    /// Read side of the history endpoints. Same store the service writes to.
    pub store: Arc<dyn ReviewStore>,
    pub config: Config,
}
