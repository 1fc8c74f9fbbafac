use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::Error;

pub(crate) const RATE_LIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");
pub(crate) const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub(crate) const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub(crate) const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Wraps a crate error for the HTTP surface.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::RepoNotFound(_) | Error::IssueNotFound(_) => StatusCode::NOT_FOUND,
            Error::GitHubApi(_) | Error::LLMApi(_) | Error::EstimationFailure { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::ParseError(_)
            | Error::Config(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Storage(_)
            | Error::Database(_)
            | Error::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal server error: {:?}", self.0);
            json!({ "error": "An internal server error occurred" })
        } else {
            tracing::warn!("Request failed with {}: {}", status, self.0);
            json!({ "error": self.0.to_string() })
        };

        if let Error::EstimationFailure { issue, .. } = &self.0 {
            body["issueNumber"] = json!(issue);
        }
        if let Error::RateLimited { retry_after, .. } = &self.0 {
            body["retryAfter"] = json!(retry_after);
        }

        let mut response = (status, Json(body)).into_response();
        if let Error::RateLimited {
            retry_after,
            window,
            limit,
            reset_at,
        } = &self.0
        {
            rate_limit_headers(
                response.headers_mut(),
                *retry_after,
                window.header_value(),
                *limit,
                reset_at.timestamp(),
            );
        }
        response
    }
}

fn rate_limit_headers(
    headers: &mut HeaderMap,
    retry_after: u64,
    window: &'static str,
    limit: u32,
    reset: i64,
) {
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    headers.insert(RATE_LIMIT_WINDOW, HeaderValue::from_static(window));
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(reset));
}
