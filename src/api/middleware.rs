//! Security configuration and per-IP rate limiting.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use super::ErrorBody;

pub const DEFAULT_RATE_LIMIT: u32 = 20;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 720;

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Allowed CORS origins (from VECTAL_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
    /// Limiter for the unauthenticated register and login endpoints
    pub rate_limiter: Option<RateLimiter>,
    /// Lifetime of a login session
    pub session_ttl: chrono::Duration,
}

impl SecurityConfig {
    /// Load security configuration from environment variables.
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("VECTAL_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let rate_limit = std::env::var("VECTAL_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);

        let trust_proxy = std::env::var("VECTAL_TRUST_PROXY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let ttl_hours = std::env::var("VECTAL_SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        Self {
            cors_origins,
            rate_limiter: Some(
                RateLimiter::new(rate_limit, Duration::from_secs(60)).trust_proxy(trust_proxy),
            ),
            session_ttl: chrono::Duration::hours(ttl_hours),
        }
    }

    /// Permissive CORS and no rate limiting (for local development/testing).
    pub fn disabled() -> Self {
        Self {
            cors_origins: None,
            rate_limiter: None,
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }

    /// Create a config with specific CORS origins.
    pub fn with_cors_origins(origins: Vec<String>) -> Self {
        Self {
            cors_origins: Some(origins),
            ..Self::disabled()
        }
    }

    /// Create a config with rate limiting enabled.
    pub fn with_rate_limit(max_requests: u32) -> Self {
        Self {
            rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
            ..Self::disabled()
        }
    }

    pub fn session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Simple in-memory rate limiter using sliding window.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Maximum requests allowed per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP` instead of the peer address
    trust_proxy: bool,
    /// Request times per IP
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_proxy: false,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Only enable behind a reverse proxy that overwrites the forwarding headers.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Check if a request from the given IP is allowed.
    /// Returns true if allowed, false if rate limited.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");

        // Drop idle clients so the map does not grow without bound
        requests.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < self.window);
            !times.is_empty()
        });

        let entry = requests.entry(ip).or_default();
        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request, rate_limiter.trust_proxy);

    if rate_limiter.check(ip) {
        next.run(request).await
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("Too many requests")),
        )
            .into_response()
    }
}

/// Client IP for rate limiting.
///
/// Proxy headers are only consulted when `trust_proxy` is set; otherwise the
/// TCP peer address from [`ConnectInfo`] is used. Requests served without
/// connection info share one unspecified-address bucket.
fn extract_client_ip(request: &Request<Body>, trust_proxy: bool) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };

    let forwarded = if trust_proxy {
        header_ip("X-Forwarded-For").or_else(|| header_ip("X-Real-IP"))
    } else {
        None
    };

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
