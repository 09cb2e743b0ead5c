//! HTTP surface: the render endpoint, health reporting and shared middleware.

mod auth;
mod error;
mod health;
mod middleware;
mod rate_limit;
mod render;
mod state;

pub use error::ApiError;
pub use health::HealthBody;
pub use middleware::RequestContext;
pub use rate_limit::RenderRateLimiter;
pub use render::RenderBody;
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub fn build_router(state: HttpState) -> Router {
    let render_routes = Router::new()
        .route("/api/render/{renderer}", post(render::render_pdf))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_render_key,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::render_rate_limit,
        ));

    Router::new()
        .merge(render_routes)
        .route("/api/health", get(health::health))
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(state, middleware::cors))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
