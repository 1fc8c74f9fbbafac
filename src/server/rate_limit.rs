use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::error::Error;
use crate::rate_limit::{Admission, Quota};
use crate::server::{ApiError, AppState};

const REMAINING_DAILY: HeaderName = HeaderName::from_static("x-ratelimit-remaining-daily");
const REMAINING_SHORT: HeaderName = HeaderName::from_static("x-ratelimit-remaining-short");

/// Peer address when the server was started with connect info, then the
/// first `X-Forwarded-For` hop.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);

    match state.limiter.admit(&key, Utc::now()) {
        Admission::Deny(denial) => {
            tracing::warn!(
                "Rate limited {} on {} window, retry in {}s",
                key,
                denial.window,
                denial.retry_after
            );
            ApiError(Error::from(denial)).into_response()
        }
        Admission::Allow(quota) => {
            let mut response = next.run(request).await;
            quota_headers(response.headers_mut(), &quota);
            response
        }
    }
}

pub(crate) fn quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(REMAINING_DAILY, HeaderValue::from(quota.daily_remaining));
    headers.insert(REMAINING_SHORT, HeaderValue::from(quota.short_term_remaining));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_client_key_prefers_peer_address() {
        let addr: SocketAddr = "10.0.0.7:52311".parse().unwrap();
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .extension(ConnectInfo(addr))
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "10.0.0.7");
    }

    #[test]
    fn test_client_key_falls_back_to_forwarded_header() {
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");

        let request = HttpRequest::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");
    }

    #[test]
    fn test_quota_headers() {
        let mut headers = HeaderMap::new();
        quota_headers(
            &mut headers,
            &Quota {
                daily_remaining: 42,
                short_term_remaining: 3,
            },
        );
        assert_eq!(headers[REMAINING_DAILY], "42");
        assert_eq!(headers[REMAINING_SHORT], "3");
    }
}
