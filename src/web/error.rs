//! HTTP mapping of domain and authentication errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::auth::AuthError;
use crate::dao::TodoError;

/// Helper to create a JSON error response with a message and status code
pub fn json_error(message: &str, status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

pub fn status_of(err: &TodoError) -> StatusCode {
    match err {
        TodoError::UnknownUser(_) => StatusCode::UNAUTHORIZED,
        TodoError::UnknownList(_) | TodoError::UnknownTask(_) => StatusCode::NOT_FOUND,
        TodoError::UserAlreadyExists(_) => StatusCode::CONFLICT,
        TodoError::Validation(_) => StatusCode::BAD_REQUEST,
        TodoError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Plain-text bodies: the message is written as-is.
impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        match status_of(&self) {
            StatusCode::UNAUTHORIZED => unauthorized(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            status => (status, self.to_string()).into_response(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::BadCredentials | AuthError::UnknownIdentity(_) => StatusCode::UNAUTHORIZED,
            AuthError::InternalAuthFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        json_error(&self.to_string(), status)
    }
}
