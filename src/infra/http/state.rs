use std::{sync::Arc, time::Instant};

use crate::{
    application::render::RenderService,
    config::{AllowedOrigins, DeployEnvironment, Settings},
};

use super::rate_limit::RenderRateLimiter;

#[derive(Clone)]
pub struct HttpState {
    pub render: RenderService,
    pub started_at: Instant,
    pub environment: DeployEnvironment,
    pub trust_proxy: bool,
    pub origins: Arc<AllowedOrigins>,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<RenderRateLimiter>>,
}

impl HttpState {
    pub fn from_settings(render: RenderService, settings: &Settings) -> Self {
        let rate_limiter = settings.rate_limit.enabled.then(|| {
            Arc::new(RenderRateLimiter::new(
                std::time::Duration::from_secs(settings.rate_limit.window_seconds.get().into()),
                settings.rate_limit.max_requests.get(),
            ))
        });

        Self {
            render,
            started_at: Instant::now(),
            environment: settings.server.environment,
            trust_proxy: settings.server.trust_proxy,
            origins: Arc::new(settings.cors.origins.clone()),
            rate_limiter,
        }
    }
}
