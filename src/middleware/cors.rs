use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{api::AppState, error::AppError};

pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Whether a request origin is on the allow-list. Requests without an
/// `Origin` header are never allowed.
pub fn is_allowed(origin: Option<&str>, allow_list: &HashSet<String>) -> bool {
    origin.is_some_and(|origin| allow_list.contains(origin))
}

/// CORS headers attached to every response of a request
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
}

impl CorsHeaders {
    /// The caller's origin is echoed only when it is allowed
    pub fn new(origin: Option<&str>, allowed: bool) -> Self {
        let allow_origin = origin
            .filter(|_| allowed)
            .and_then(|origin| HeaderValue::from_str(origin).ok())
            .unwrap_or_else(|| HeaderValue::from_static(""));

        Self { allow_origin }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
}

/// Origin gate for the recommendation endpoint.
///
/// Preflight requests are answered with 204 and requests from origins off
/// the allow-list with 403; everything else reaches the handler. CORS
/// headers are set on all of these responses.
pub async fn cors_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let allowed = is_allowed(origin.as_deref(), &state.allowed_origins);
    let cors = CorsHeaders::new(origin.as_deref(), allowed);

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else if !allowed {
        tracing::warn!(
            origin = origin.as_deref().unwrap_or("<none>"),
            "Rejected request from disallowed origin"
        );
        AppError::OriginNotAllowed.into_response()
    } else {
        next.run(request).await
    };

    cors.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_list() -> HashSet<String> {
        HashSet::from(["http://localhost:5173".to_string()])
    }

    #[test]
    fn test_is_allowed() {
        assert!(is_allowed(Some("http://localhost:5173"), &allow_list()));
        assert!(!is_allowed(Some("https://evil.example.com"), &allow_list()));
        assert!(!is_allowed(None, &allow_list()));
    }

    #[test]
    fn test_headers_echo_allowed_origin() {
        let mut headers = HeaderMap::new();
        CorsHeaders::new(Some("http://localhost:5173"), true).apply(&mut headers);

        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_headers_empty_origin_when_disallowed() {
        let mut headers = HeaderMap::new();
        CorsHeaders::new(Some("https://evil.example.com"), false).apply(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "");
    }
}
