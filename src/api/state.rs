use std::collections::HashSet;
use std::sync::Arc;

use crate::services::RecommendationPipeline;

/// Shared application state
///
/// Read-only after startup; every request builds its own trace and data.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RecommendationPipeline>,
    pub allowed_origins: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(pipeline: RecommendationPipeline, allowed_origins: HashSet<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            allowed_origins: Arc::new(allowed_origins),
        }
    }
}
