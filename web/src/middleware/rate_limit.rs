//! Per-client request quota for the JSON-RPC endpoints.
//!
//! Clients are keyed by peer IP, falling back to the first
//! `X-Forwarded-For` hop when no socket address is known.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use log::*;
use service::config::Config;

use crate::error::{Error, ErrorKind};
use crate::AppState;

pub type ClientRateLimiter = DefaultKeyedRateLimiter<String>;

pub(crate) fn client_rate_limiter(config: &Config) -> ClientRateLimiter {
    RateLimiter::keyed(quota(config.rate_limit_max, config.rate_limit_window()))
}

/// `max` requests per `window`, available as one burst and replenished evenly.
fn quota(max: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) async fn limit_per_client(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match app_state.rate_limiter.check_key(&key) {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = (wait.as_millis() as u64).div_ceil(1000).max(1);
            warn!(
                "Rate limit exceeded: {} {} client={key}",
                request.method(),
                request.uri().path()
            );
            Error::new(ErrorKind::RateLimited(retry_after)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_quota_allows_max_requests_per_window() {
        let limiter: ClientRateLimiter = RateLimiter::keyed(quota(3, Duration::from_secs(10)));
        let key = "203.0.113.7".to_string();

        for _ in 0..3 {
            assert!(limiter.check_key(&key).is_ok());
        }
        assert!(limiter.check_key(&key).is_err());
        assert!(limiter.check_key(&"198.51.100.1".to_string()).is_ok());
    }

    #[test]
    fn test_client_key_prefers_peer_address() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "198.51.100.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "198.51.100.1");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 7], 4000))));
        assert_eq!(client_key(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_key_without_any_address() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");
    }
}
