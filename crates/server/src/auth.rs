// SPDX-License-Identifier: MIT

//! §6.1/§6.2 bearer auth: client routes check `ASH_API_KEY`, runner-internal
//! routes check `ASH_INTERNAL_SECRET`. Either check is a no-op (request
//! passes through) when the corresponding variable is unset, matching "all
//! non-public routes require ... when an API key is configured".

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

pub async fn require_api_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match &state.config.api_key {
        Some(key) if !bearer_matches(&headers, key) => Err(ApiError::unauthorized()),
        _ => Ok(next.run(request).await),
    }
}

pub async fn require_internal_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match &state.config.internal_secret {
        Some(secret) if !bearer_matches(&headers, secret) => Err(ApiError::unauthorized()),
        _ => Ok(next.run(request).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn matches_exact_token() {
        assert!(bearer_matches(&headers_with_bearer("secret"), "secret"));
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(!bearer_matches(&headers_with_bearer("wrong"), "secret"));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(!bearer_matches(&HeaderMap::new(), "secret"));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Basic secret".parse().unwrap());
        assert!(!bearer_matches(&headers, "secret"));
    }
}
