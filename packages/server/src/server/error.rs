//! Mapping of login errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domains::auth::LoginError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

/// A `LoginError` on its way out through the HTTP edge.
#[derive(Debug)]
pub struct ApiError(pub LoginError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LoginError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LoginError::AlreadyPending | LoginError::UnexpectedInput { .. } => {
                StatusCode::CONFLICT
            }
            LoginError::NoActiveAttempt | LoginError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            LoginError::NotPermitted(_) => StatusCode::FORBIDDEN,
            LoginError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.0 {
            LoginError::Validation(_) => "validation_failed",
            LoginError::AlreadyPending => "already_pending",
            LoginError::NoActiveAttempt => "no_active_attempt",
            LoginError::SessionNotFound(_) => "session_not_found",
            LoginError::UnexpectedInput { .. } => "unexpected_input",
            LoginError::NotPermitted(_) => "not_permitted",
            LoginError::Storage(_) => "storage_failed",
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        // Storage details stay in the log.
        let message = match &self.0 {
            LoginError::Storage(_) => "session storage failed".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
