use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{
    cors::cors_middleware,
    request_id::{make_span_with_request_id, request_id_middleware},
};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    // Recommendation endpoint, behind the origin gate
    let recommendations = Router::new()
        .route("/", any(handlers::recommend))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            cors_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(recommendations)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
