//! Error taxonomy at the trust boundary.
//!
//! Internal errors carry detail for logs; [`ErrorCode`] is the only thing that
//! crosses the boundary to callers.

use serde::Serialize;
use thiserror::Error;

use warden_auth::AuthzError;

use crate::store::StoreError;

/// Coarse, caller-visible error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingToken,
    InvalidTokenFormat,
    InvalidToken,
    RoleRequired,
    PermissionDenied,
    InvalidPermissions,
    RoleNotFound,
    RoleConflict,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidTokenFormat => "INVALID_TOKEN_FORMAT",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::RoleRequired => "ROLE_REQUIRED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidPermissions => "INVALID_PERMISSIONS",
            Self::RoleNotFound => "ROLE_NOT_FOUND",
            Self::RoleConflict => "ROLE_CONFLICT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Generic message safe to show to callers.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "authorization token is required",
            Self::InvalidTokenFormat => "authorization header is malformed",
            Self::InvalidToken => "token is invalid or expired",
            Self::RoleRequired => "a role is required for this operation",
            Self::PermissionDenied => "insufficient permissions",
            Self::InvalidPermissions => "one or more permission codes are not recognized",
            Self::RoleNotFound => "role not found",
            Self::RoleConflict => "role already exists",
            Self::InternalError => "internal error",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication/authorization failure.
///
/// ## Error Categories
///
/// - **MissingToken**: no credential presented
/// - **MalformedInput**: bad header or token shape
/// - **InvalidToken**: signature, expiry, algorithm or kid problems (collapsed)
/// - **KeyNotFound**: no verification key for a kid (collapsed to `InvalidToken` at the boundary)
/// - **Forbidden**: missing role or permission
/// - **Store**: backing store refused or failed a role operation
/// - **Dependency**: cache unreachable where it matters (invalidation)
/// - **UnknownPermissions**: role mutation names codes missing from the catalog
/// - **Configuration**: key material or wiring problems
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dependency failure: {0}")]
    Dependency(String),

    #[error("unknown permission codes: {}", .0.join(", "))]
    UnknownPermissions(Vec<String>),

    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl AuthError {
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MissingToken,
            Self::MalformedInput(_) => ErrorCode::InvalidTokenFormat,
            Self::InvalidToken | Self::KeyNotFound(_) => ErrorCode::InvalidToken,
            Self::Forbidden(AuthzError::RoleRequired) => ErrorCode::RoleRequired,
            Self::Forbidden(AuthzError::Forbidden(_)) => ErrorCode::PermissionDenied,
            Self::Store(StoreError::NotFound(_)) => ErrorCode::RoleNotFound,
            Self::Store(StoreError::Conflict(_)) => ErrorCode::RoleConflict,
            Self::Store(StoreError::Unavailable(_)) | Self::Dependency(_) => ErrorCode::InternalError,
            Self::UnknownPermissions(_) => ErrorCode::InvalidPermissions,
            Self::Configuration(_) => ErrorCode::InternalError,
        }
    }
}
