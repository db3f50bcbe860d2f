//! Governor-based rate limiting for the API routes
//!
//! Quotas are kept in memory per client IP. Requests outside `/api` (health
//! probes) are never counted. Without connection info, as when a router is
//! driven directly in tests, every request shares one unspecified-address key.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};

use crate::config::LocalRateLimitConfig;
use crate::handlers::ApiError;

/// Message sent with every 429
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

const LIMITED_PREFIX: &str = "/api";

/// Shared per-client limiter
#[derive(Clone)]
pub struct ApiRateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
}

impl ApiRateLimit {
    /// Limiter for `config`, `None` when disabled or the quota is empty
    pub fn from_config(config: &LocalRateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let quota = quota(config);
        if quota.is_none() {
            tracing::warn!(
                requests_per_period = config.requests_per_period,
                period_secs = config.period_secs,
                "Rate limit quota is empty, rate limiting disabled"
            );
        }

        Some(Self {
            limiter: Arc::new(RateLimiter::keyed(quota?)),
            clock: DefaultClock::default(),
        })
    }

    /// Count one request from `client`
    ///
    /// On rejection, returns how long until the next request would pass.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&client)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

fn quota(config: &LocalRateLimitConfig) -> Option<Quota> {
    let requests = NonZeroU32::new(config.requests_per_period)?;
    let burst = NonZeroU32::new(config.requests_per_period.saturating_add(config.burst_size))?;
    Quota::with_period(config.period() / requests.get()).map(|quota| quota.allow_burst(burst))
}

fn is_limited(path: &str) -> bool {
    path == LIMITED_PREFIX
        || path
            .strip_prefix(LIMITED_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware rejecting `/api` requests over quota with a 429
pub async fn limit_api(
    State(limit): State<ApiRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    if !is_limited(request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_ip(&request);
    match limit.check(client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            tracing::warn!(client = %client, retry_after_secs = wait.as_secs(), "Rate limit exceeded");
            let mut response = ApiError::too_many_requests(RATE_LIMIT_MESSAGE).into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(wait.as_secs().max(1)),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests: u32, burst: u32) -> LocalRateLimitConfig {
        LocalRateLimitConfig {
            requests_per_period: requests,
            burst_size: burst,
            ..LocalRateLimitConfig::default()
        }
    }

    #[test]
    fn test_quota_allows_requests_then_rejects() {
        let limit = ApiRateLimit::from_config(&config(3, 0)).unwrap();
        let client = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        for _ in 0..3 {
            assert!(limit.check(client).is_ok());
        }
        let wait = limit.check(client).unwrap_err();
        assert!(wait > Duration::from_secs(60));

        // other clients have their own quota
        assert!(limit.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))).is_ok());
    }

    #[test]
    fn test_burst_adds_to_quota() {
        let limit = ApiRateLimit::from_config(&config(2, 1)).unwrap();
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!((0..3).all(|_| limit.check(client).is_ok()));
        assert!(limit.check(client).is_err());
    }

    #[test]
    fn test_disabled_or_empty_quota() {
        let disabled = LocalRateLimitConfig {
            enabled: false,
            ..LocalRateLimitConfig::default()
        };
        assert!(ApiRateLimit::from_config(&disabled).is_none());
        assert!(ApiRateLimit::from_config(&config(0, 5)).is_none());
    }

    #[test]
    fn test_only_api_paths_are_limited() {
        assert!(is_limited("/api"));
        assert!(is_limited("/api/v1/tours"));
        assert!(!is_limited("/apis"));
        assert!(!is_limited("/health"));
    }
}
