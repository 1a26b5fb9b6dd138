use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::AuthzError;
use warden_infra::{AuthError, ErrorCode};

/// Handler/middleware error.
///
/// Renders as `{"error": CODE, "message": ...}` with the code's generic
/// message; the underlying detail only reaches the log.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        Self(AuthError::from(e))
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::MissingToken | ErrorCode::InvalidTokenFormat | ErrorCode::InvalidToken => {
            StatusCode::UNAUTHORIZED
        }
        ErrorCode::RoleRequired | ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::InvalidPermissions => StatusCode::BAD_REQUEST,
        ErrorCode::RoleNotFound => StatusCode::NOT_FOUND,
        ErrorCode::RoleConflict => StatusCode::CONFLICT,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let code = self.0.code();
        let status = status_for(code);

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = code.as_str(), error = %self.0, "request rejected");
        }

        let message = match &self.0 {
            // The unknown codes are the caller's own input.
            AuthError::UnknownPermissions(codes) => format!("{}: {}", code.public_message(), codes.join(", ")),
            _ => code.public_message().to_string(),
        };
        json_error(status, code.as_str(), message)
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
