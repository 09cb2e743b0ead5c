use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{auth::presented_key, error::ApiError, state::HttpState};

/// Checks between sweeps of clients whose hits have all expired.
const SWEEP_EVERY: u64 = 1024;

/// Sliding-window request counter keyed by an opaque client fingerprint.
#[derive(Debug, Clone)]
pub struct RenderRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    checks: Arc<AtomicU64>,
}

impl RenderRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a hit for `key`; returns whether it is allowed and how many remain.
    pub fn allow(&self, key: &str) -> (bool, u32) {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining.saturating_sub(1))
    }

    /// Forget clients with no hits left inside the window.
    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}

/// SHA-256 of the presented API key, or of the client address when there is none.
pub(crate) fn client_fingerprint(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> String {
    let source = presented_key(headers)
        .or_else(|| trust_proxy.then(|| forwarded_for(headers)).flatten())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    sha256_hex(&source)
}

fn sha256_hex(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

pub async fn render_rate_limit(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_fingerprint(request.headers(), peer, state.trust_proxy);

    let (allowed, remaining) = limiter.allow(&key);
    if !allowed {
        metrics::counter!("pressroom_rate_limited_total").increment(1);
        debug!(
            target = "pressroom::http::rate_limit",
            client = %&key[..12],
            limit = limiter.limit(),
            "rate limit exceeded"
        );
        return ApiError::RateLimited {
            retry_after: limiter.retry_after_secs(),
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", limiter.limit().into());
    headers.insert("ratelimit-remaining", remaining.into());
    response
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn rejects_after_the_ceiling() {
        let limiter = RenderRateLimiter::new(Duration::from_secs(60), 2);

        assert_eq!(limiter.allow("client"), (true, 1));
        assert_eq!(limiter.allow("client"), (true, 0));
        assert_eq!(limiter.allow("client"), (false, 0));
        assert_eq!(limiter.allow("other"), (true, 1));
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let limiter = RenderRateLimiter::new(Duration::from_millis(20), 1);

        assert!(limiter.allow("client").0);
        assert!(!limiter.allow("client").0);
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.allow("client").0);
    }

    #[test]
    fn sweep_forgets_idle_clients() {
        let limiter = RenderRateLimiter::new(Duration::from_millis(20), 5);

        limiter.allow("idle");
        std::thread::sleep(Duration::from_millis(30));
        limiter.allow("active");
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.allow("active"), (true, 3));
    }

    #[test]
    fn periodic_sweep_bounds_the_client_table() {
        let limiter = RenderRateLimiter::new(Duration::from_millis(1), 1);

        for client in 0..SWEEP_EVERY - 1 {
            limiter.allow(&client.to_string());
        }
        std::thread::sleep(Duration::from_millis(5));
        limiter.allow("last");

        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn fingerprint_prefers_the_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        let peer: SocketAddr = "10.0.0.1:4000".parse().expect("addr");

        let keyed = client_fingerprint(&headers, Some(peer), false);
        assert_eq!(keyed, sha256_hex("secret"));

        let anonymous = client_fingerprint(&HeaderMap::new(), Some(peer), false);
        assert_eq!(anonymous, sha256_hex("10.0.0.1"));
    }

    #[test]
    fn forwarded_for_only_counts_behind_a_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let peer: SocketAddr = "10.0.0.1:4000".parse().expect("addr");

        assert_eq!(
            client_fingerprint(&headers, Some(peer), true),
            sha256_hex("203.0.113.9")
        );
        assert_eq!(
            client_fingerprint(&headers, Some(peer), false),
            sha256_hex("10.0.0.1")
        );
    }
}
