//! Rate limiting.
//!
//! Login attempts use a fixed-window counter per client origin so the policy
//! reads exactly as configured ("5 attempts per 15 minutes"). Public form
//! submissions use a `governor` token bucket per IP to blunt spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::{IpExtractor, extract_client_ip};

/// Default login policy: 5 attempts
pub const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;

/// Default login window: 15 minutes
pub const DEFAULT_LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Public form submissions allowed per IP per minute.
const FORM_SUBMISSIONS_PER_MIN: u32 = 5;

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window attempt counter keyed by an arbitrary string.
#[derive(Default)]
pub struct LoginRateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt for `key`. Returns `false` once more than
    /// `max_attempts` calls land inside one window.
    pub fn check_limit(&self, key: &str, max_attempts: u32, window: Duration) -> bool {
        self.check_limit_at(key, max_attempts, window, Instant::now())
    }

    /// Same as [`check_limit`](Self::check_limit) with an explicit clock.
    pub fn check_limit_at(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
        now: Instant,
    ) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= max_attempts {
            return false;
        }

        entry.count += 1;
        true
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn prune_expired(&self, window: Duration) -> usize {
        self.prune_expired_at(window, Instant::now())
    }

    pub fn prune_expired_at(&self, window: Duration, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.window_start) < window);
        before - entries.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Login rate-limit policy plus its counter.
pub struct LoginPolicy {
    pub limiter: LoginRateLimiter,
    pub max_attempts: u32,
    pub window: Duration,
}

impl LoginPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            limiter: LoginRateLimiter::new(),
            max_attempts,
            window,
        }
    }

    /// Count a login attempt from `origin`.
    pub fn allow(&self, origin: &str) -> bool {
        self.limiter
            .check_limit(&login_key(origin), self.max_attempts, self.window)
    }
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_MAX_ATTEMPTS, DEFAULT_LOGIN_WINDOW)
    }
}

/// Rate-limit key for login attempts from a client origin.
pub fn login_key(origin: &str) -> String {
    format!("login:{}", origin)
}

/// Per-IP limiter for public form endpoints.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// State for the form-submission rate-limit middleware.
#[derive(Clone)]
pub struct FormRateLimit {
    pub limiter: Arc<IpLimiter>,
    pub ip_extractor: Option<IpExtractor>,
}

impl FormRateLimit {
    pub fn new(ip_extractor: Option<IpExtractor>) -> Self {
        Self::with_quota(FORM_SUBMISSIONS_PER_MIN, ip_extractor)
    }

    pub fn with_quota(per_minute: u32, ip_extractor: Option<IpExtractor>) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_extractor,
        }
    }
}

/// Middleware for rate limiting public form submissions.
pub async fn rate_limit_form_submit(
    State(config): State<FormRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_extractor.as_ref()) {
        Ok(ip) => ip,
        Err(e) => {
            warn!(reason = e, "Unable to determine client IP for form submission");
            return ApiError::forbidden("Unable to determine client IP").into_response();
        }
    };

    match config.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Form submission rate limit exceeded");
            ApiError::too_many_requests("Too many submissions. Please wait before trying again.")
                .into_response()
        }
    }
}
