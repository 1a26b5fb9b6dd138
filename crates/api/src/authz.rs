//! Route-level permission guards.
//!
//! Checks run against the merged permission list carried by [`AuthContext`];
//! denials log the full explanation at debug and return a bare code.

use warden_auth::{AuthorizationExplanation, AuthzError, Permission, authorize, explain_authorization};

use crate::app::errors::ApiError;
use crate::context::AuthContext;

pub fn require_permission(ctx: &AuthContext, required: &Permission) -> Result<(), ApiError> {
    authorize(ctx.principal(), ctx.permissions(), required).map_err(|e| {
        let explanation = explain(ctx, required);
        tracing::debug!(
            subject_id = %ctx.subject_id(),
            required = %required,
            reason = %explanation.reason,
            "permission denied"
        );
        ApiError::from(e)
    })
}

/// Passes if any one of `required` is granted. An empty list never passes.
pub fn require_any_permission(ctx: &AuthContext, required: &[Permission]) -> Result<(), ApiError> {
    if !ctx.principal().has_role() {
        return Err(AuthzError::RoleRequired.into());
    }

    if required.iter().any(|p| authorize(ctx.principal(), ctx.permissions(), p).is_ok()) {
        return Ok(());
    }

    let wanted: Vec<&str> = required.iter().map(Permission::as_str).collect();
    tracing::debug!(
        subject_id = %ctx.subject_id(),
        required = ?wanted,
        "permission denied: none of the alternatives are granted"
    );
    Err(AuthzError::Forbidden(wanted.join("|")).into())
}

pub fn explain(ctx: &AuthContext, required: &Permission) -> AuthorizationExplanation {
    explain_authorization(ctx.principal(), ctx.permissions(), required)
}
