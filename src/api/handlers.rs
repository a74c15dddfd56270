use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{PreferenceSet, RecommendationResult},
};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Recommendation endpoint. Only `POST` is served; preflight and origin
/// checks happen in the CORS middleware before this runs.
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    body: Bytes,
) -> AppResult<Json<RecommendationResult>> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let preferences = PreferenceSet::from_body(&body).map_err(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "Rejected malformed request");
        e
    })?;

    tracing::info!(
        request_id = %request_id,
        participants = preferences.participants.len(),
        available_time = %preferences.available_time,
        "Processing recommendation request"
    );

    let result = state
        .pipeline
        .run(&request_id.as_str(), &preferences)
        .await?;

    tracing::info!(
        request_id = %request_id,
        no_match = result.no_match,
        "Recommendation completed"
    );

    Ok(Json(result))
}
