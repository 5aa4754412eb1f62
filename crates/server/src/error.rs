// SPDX-License-Identifier: MIT

//! §7: every crate's own error enum classifies into [`ErrorKind`]; this is
//! the one place that turns a kind into an HTTP status + JSON body.

use ash_core::{Classify, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    kind: ErrorKind,
    message: String,
    status_override: Option<StatusCode>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status_override: None }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "missing or invalid bearer token")
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what)
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, what)
    }

    pub fn session_not_found() -> Self {
        Self::not_found("session not found")
    }

    /// §6.1: `resume` on an ended session is `410`, not the `400` that
    /// [`ErrorKind::InvalidState`] maps to everywhere else. `ErrorKind` has
    /// no `Gone` variant since this is the only place the taxonomy needs
    /// one, so it's special-cased here rather than in `Classify`.
    fn gone(what: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::InvalidState, what);
        err.status_override = Some(StatusCode::GONE);
        err
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        self.status_override
            .unwrap_or_else(|| StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.kind.to_string(),
            "message": self.message,
            "retriable": self.kind.retriable(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_on_ended_session_is_410() {
        let err: ApiError = ash_router::RouterError::Ended.into();
        assert_eq!(err.status(), StatusCode::GONE);
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn capacity_reached_is_retriable_503() {
        let err: ApiError = ash_backend::BackendError::RunnerStatus { status: 503, body: String::new() }.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_router_errors_fall_through_to_classify() {
        let err: ApiError = ash_router::RouterError::AgentNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

/// Blanket conversion from any of this workspace's `Classify` error enums:
/// the kind drives the status, `Display` drives the message.
fn from_classified(err: &(impl Classify + std::fmt::Display)) -> ApiError {
    ApiError::new(err.kind(), err.to_string())
}

impl From<ash_router::RouterError> for ApiError {
    fn from(err: ash_router::RouterError) -> Self {
        match err {
            ash_router::RouterError::Ended => ApiError::gone("session has ended"),
            other => from_classified(&other),
        }
    }
}

impl From<ash_backend::BackendError> for ApiError {
    fn from(err: ash_backend::BackendError) -> Self {
        from_classified(&err)
    }
}

impl From<ash_coordinator::CoordinatorError> for ApiError {
    fn from(err: ash_coordinator::CoordinatorError) -> Self {
        from_classified(&err)
    }
}

impl From<ash_db::DbError> for ApiError {
    fn from(err: ash_db::DbError) -> Self {
        from_classified(&err)
    }
}
