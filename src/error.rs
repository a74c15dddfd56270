use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Origin not allowed")]
    OriginNotAllowed,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Embedding stage failed: {0}")]
    UpstreamEmbedding(String),

    #[error("Retrieval stage failed: {0}")]
    UpstreamRetrieval(String),

    #[error("Generation stage failed: {0}")]
    UpstreamGeneration(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::OriginNotAllowed => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UpstreamEmbedding(_)
            | AppError::UpstreamRetrieval(_)
            | AppError::UpstreamGeneration(_)
            | AppError::HttpClient(_)
            | AppError::ExternalApi(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::OriginNotAllowed => json!({ "error": "Origin not allowed" }),
            AppError::MethodNotAllowed => json!({ "error": "Method not allowed" }),
            AppError::MalformedRequest(details) => json!({
                "error": "Invalid request body",
                "details": details
            }),
            AppError::UpstreamEmbedding(details) => json!({
                "error": "Failed to generate embedding",
                "details": details
            }),
            AppError::UpstreamRetrieval(details) => json!({
                "error": "Failed to search for similar movies",
                "details": details
            }),
            AppError::UpstreamGeneration(details) => json!({
                "error": "Failed to generate recommendation",
                "details": details
            }),
            other => json!({
                "error": "Internal server error",
                "details": other.to_string()
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
