use serde::Serialize;
use thiserror::Error;

use warden_core::SubjectId;

use crate::{Permission, Principal, has_permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("principal has no role")]
    RoleRequired,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize against an already-merged permission list.
///
/// - No IO
/// - No panics
/// - Pure policy check
pub fn authorize(
    principal: &Principal,
    effective: &[Permission],
    required: &Permission,
) -> Result<(), AuthzError> {
    if !principal.has_role() {
        return Err(AuthzError::RoleRequired);
    }

    if has_permission(effective, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Intended for logs and audit sinks, never for response bodies.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub subject_id: SubjectId,
    pub role: String,
    /// The grant entries that cover the requirement (empty when denied).
    pub matched_by: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    RoleRequired,
    MissingPermission,
}

/// Explain why a requirement is (or would be) granted or denied.
pub fn explain_authorization(
    principal: &Principal,
    effective: &[Permission],
    required: &Permission,
) -> AuthorizationExplanation {
    let base = |granted: bool, reason: String, matched_by: Vec<String>, denial: Option<DenialReason>| {
        AuthorizationExplanation {
            required_permission: required.as_str().to_string(),
            granted,
            reason,
            subject_id: principal.subject_id.clone(),
            role: principal.role.as_str().to_string(),
            matched_by,
            denial_reason: denial,
        }
    };

    if !principal.has_role() {
        return base(
            false,
            "principal carries no role".to_string(),
            Vec::new(),
            Some(DenialReason {
                kind: DenialKind::RoleRequired,
                message: "a role is required before permissions are evaluated".to_string(),
            }),
        );
    }

    let matched_by: Vec<String> = effective
        .iter()
        .filter(|g| g.covers(required))
        .map(|g| g.as_str().to_string())
        .collect();

    if matched_by.is_empty() {
        base(
            false,
            format!("role '{}' does not grant '{}'", principal.role, required),
            matched_by,
            Some(DenialReason {
                kind: DenialKind::MissingPermission,
                message: format!("missing required permission: '{required}'"),
            }),
        )
    } else {
        let reason = if matched_by.iter().any(|m| m == required.as_str()) {
            format!("granted explicitly by role '{}'", principal.role)
        } else {
            format!("granted by wildcard {:?}", matched_by)
        };
        base(true, reason, matched_by, None)
    }
}
