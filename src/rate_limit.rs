//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Default login attempts per minute per client IP.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 5;

/// Key used when the client address cannot be determined. All such clients
/// share one bucket.
const UNKNOWN_CLIENT: &str = "unknown";

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for password login
    pub login: Arc<IpLimiter>,
    /// Read the client IP from `X-Forwarded-For` instead of the socket
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Allow `login_per_minute` login attempts per IP, all available as a burst.
    pub fn new(login_per_minute: u32, trust_proxy: bool) -> Self {
        let per_minute = NonZeroU32::new(login_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_proxy,
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request, config.trust_proxy)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            ApiError::too_many_requests(
                "Too many authentication attempts. Please wait before trying again.",
            )
            .into_response()
        }
    }
}
