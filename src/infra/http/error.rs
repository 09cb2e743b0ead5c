use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::application::{error::ErrorReport, render::RenderError};

/// Error responses of the render API.
///
/// Gatekeeping failures (auth, routing, throttling) answer with `{error}`;
/// failures of the render itself answer with `{status, message[, reason]}`.
#[derive(Debug)]
pub enum ApiError {
    UnknownRenderer(String),
    MissingKey,
    InvalidKey,
    OriginNotAllowed(String),
    RateLimited { retry_after: u64 },
    InvalidPage(String),
    RenderFailed { reason: String },
    TimedOut(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownRenderer(_) => StatusCode::NOT_FOUND,
            ApiError::MissingKey => StatusCode::UNAUTHORIZED,
            ApiError::InvalidKey | ApiError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidPage(_) => StatusCode::BAD_REQUEST,
            ApiError::RenderFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::UnknownRenderer(name) => json!({"error": format!("unknown renderer `{name}`")}),
            ApiError::MissingKey => json!({"error": "missing api key"}),
            ApiError::InvalidKey => json!({"error": "invalid api key"}),
            ApiError::OriginNotAllowed(origin) => {
                json!({"error": format!("origin not allowed: {origin}")})
            }
            ApiError::RateLimited { retry_after } => json!({
                "error": "rate limit exceeded",
                "retryAfter": retry_after,
            }),
            ApiError::InvalidPage(detail) => json!({
                "status": "error",
                "message": format!("Invalid page config: {detail}"),
            }),
            ApiError::RenderFailed { reason } => json!({
                "status": "render-error",
                "message": "Failed to render the pdf",
                "reason": reason,
            }),
            ApiError::TimedOut(_) => json!({
                "status": "error",
                "message": "Render timed out",
            }),
            ApiError::Internal(_) => json!({
                "status": "error",
                "message": "Internal server error",
            }),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::UnknownRenderer(name) => format!("unknown renderer `{name}`"),
            ApiError::MissingKey => "missing api key".to_string(),
            ApiError::InvalidKey => "invalid api key".to_string(),
            ApiError::OriginNotAllowed(origin) => format!("origin `{origin}` not allowed"),
            ApiError::RateLimited { retry_after } => {
                format!("rate_limited: retry_after={retry_after}")
            }
            ApiError::InvalidPage(detail) => detail.clone(),
            ApiError::RenderFailed { reason } => reason.clone(),
            ApiError::TimedOut(detail) | ApiError::Internal(detail) => detail.clone(),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::UnknownRenderer(name) => ApiError::UnknownRenderer(name),
            RenderError::InvalidRequest(err) => ApiError::InvalidPage(err.to_string()),
            RenderError::Page { message } => ApiError::RenderFailed { reason: message },
            RenderError::TimedOut(_) => ApiError::TimedOut(err.to_string()),
            RenderError::Payload(_) | RenderError::Engine(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        match &self {
            ApiError::MissingKey => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(r#"Bearer realm="render""#),
                );
            }
            ApiError::RateLimited { retry_after } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            _ => {}
        }

        ErrorReport::from_message("infra::http::api", status, self.detail()).attach(&mut response);
        response
    }
}
