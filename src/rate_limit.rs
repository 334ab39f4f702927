/// Request rate limiting
///
/// The OTP endpoints are public and each call can trigger an SMS, so
/// they get their own, much tighter, limiter.
use crate::{context::AppContext, error::AppError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for OTP send/verify/resend
    pub otp_rps: u32,
    pub otp_burst: u32,
    /// Requests per second for authenticated callers
    pub authenticated_rps: u32,
    /// Requests per second for anonymous callers on other endpoints
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            otp_rps: 5,
            otp_burst: 20,
            authenticated_rps: 100,
            unauthenticated_rps: 20,
            burst_size: 50,
        }
    }
}

fn quota(rps: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    otp: Arc<DirectLimiter>,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            otp: Arc::new(GovernorLimiter::direct(quota(config.otp_rps, config.otp_burst))),
            authenticated: Arc::new(GovernorLimiter::direct(quota(
                config.authenticated_rps,
                config.burst_size,
            ))),
            unauthenticated: Arc::new(GovernorLimiter::direct(quota(
                config.unauthenticated_rps,
                config.burst_size,
            ))),
        }
    }

    fn check(limiter: &DirectLimiter) -> Result<(), AppError> {
        limiter.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }

    pub fn check_otp(&self) -> Result<(), AppError> {
        Self::check(&self.otp)
    }

    pub fn check_authenticated(&self) -> Result<(), AppError> {
        Self::check(&self.authenticated)
    }

    pub fn check_unauthenticated(&self) -> Result<(), AppError> {
        Self::check(&self.unauthenticated)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let has_auth_header = request.headers().get("authorization").is_some();

    let result = if path.starts_with("/otp/") {
        ctx.rate_limiter.check_otp()
    } else if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    if let Err(e) = result {
        tracing::warn!(path = %path, "rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}
