use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Keys with no admission newer than `window * 2` get evicted once the map
/// grows past this, so per-client state stays bounded.
const EVICTION_THRESHOLD: usize = 1024;

/// Sliding-window request limiter: per client key, the admissions timestamped
/// within the trailing window are counted against the configured maximum.
///
/// Constructed once at startup and carried in [`AppState`]; all checks go
/// through a write guard, so concurrent increment-and-check cannot lose
/// updates.
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    admissions: RwLock<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            admissions: RwLock::new(HashMap::new()),
        }
    }

    /// Admit and record the request if fewer than `max_requests` admissions
    /// fall within `[now - window, now]` for this key.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut admissions = self.admissions.write().await;

        if admissions.len() > EVICTION_THRESHOLD {
            let horizon = self.window * 2;
            admissions.retain(|_, stamps| {
                stamps
                    .last()
                    .is_some_and(|&last| now.duration_since(last) < horizon)
            });
        }

        let stamps = admissions.entry(key.to_string()).or_default();
        stamps.retain(|&ts| now.duration_since(ts) < self.window);

        if stamps.len() < self.max_requests {
            stamps.push(now);
            true
        } else {
            false
        }
    }
}

/// Client key for limiting: first X-Forwarded-For hop, then the peer address,
/// then a shared fallback bucket.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

pub async fn limit_requests(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer);

    if !state.limiter.check(&key).await {
        warn!(%key, "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sixth_request_in_window_is_rejected() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(10));
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_elapsing_admits_again() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(10));
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(limiter.check("10.0.0.1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_rather_than_resets() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(10));
        assert!(limiter.check("k").await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.check("k").await);
        // First admission is 6s old, second is fresh: still two in window.
        assert!(!limiter.check("k").await);
        tokio::time::advance(Duration::from_secs(5)).await;
        // First admission aged out, second still counts.
        assert!(limiter.check("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        assert!(limiter.check("a").await);
        assert!(limiter.check("b").await);
        assert!(!limiter.check("a").await);
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:55000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn client_key_falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:55000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "192.0.2.1");
        assert_eq!(client_key(&headers, None), "unknown");
    }
}
