use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::{error::ApiError, state::HttpState};

/// API key from `Authorization: Bearer <key>`, falling back to `X-API-Key`.
pub(crate) fn presented_key(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty());
    if let Some(key) = bearer {
        return Some(key.to_string());
    }

    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Gate a render route on the target renderer's access policy.
pub async fn require_render_key(
    State(state): State<HttpState>,
    Path(renderer): Path<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(binding) = state.render.registry().lookup(&renderer) else {
        return ApiError::UnknownRenderer(renderer).into_response();
    };

    if !binding.access.requires_key() {
        return next.run(request).await;
    }

    let Some(presented) = presented_key(request.headers()) else {
        return ApiError::MissingKey.into_response();
    };

    if !binding.access.authorize(&presented) {
        debug!(
            target = "pressroom::http::auth",
            renderer = %renderer,
            "rejected api key"
        );
        return ApiError::InvalidKey.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  from-bearer "),
        );
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));

        assert_eq!(presented_key(&headers).as_deref(), Some("from-bearer"));
    }

    #[test]
    fn non_bearer_authorization_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));

        assert_eq!(presented_key(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        headers.insert("x-api-key", HeaderValue::from_static(""));

        assert_eq!(presented_key(&headers), None);
    }
}
