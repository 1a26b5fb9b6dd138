use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::SubjectId;

use crate::{Permission, Principal, RoleCode};

/// Claims carried by an access token minted by warden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / principal identifier.
    pub sub: SubjectId,
    pub email: String,
    pub name: String,
    /// Primary role code.
    pub role: RoleCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Snapshot of the grant at issue time. Never authoritative.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn to_principal(&self) -> Principal {
        let roles = if self.roles.is_empty() {
            vec![self.role.clone()]
        } else {
            self.roles.clone()
        };

        Principal {
            subject_id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            roles,
            team: self.team.clone(),
            claimed_permissions: self.permissions.clone(),
        }
    }
}

/// Claims carried by a refresh token: the subject and the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: SubjectId,
    /// Session identifier.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Lenient claim shape accepted from either signing scheme.
///
/// Legacy tokens carry `user_id` instead of `sub` and a single `role` instead of
/// a role list; everything optional defaults to empty so normalization can
/// decide what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token carries no subject")]
    MissingSubject,

    #[error("token subject is malformed")]
    InvalidSubject,
}

impl RawClaims {
    /// Normalize into a [`Principal`].
    ///
    /// - subject: `user_id` when present, else `sub`; must be a valid [`SubjectId`]
    /// - roles: the `roles` array, else derived from the single `role`
    /// - role: `role`, else the first entry of `roles`
    pub fn normalize(self) -> Result<Principal, ClaimsError> {
        let raw_subject = self
            .user_id
            .filter(|s| !s.is_empty())
            .or(self.sub)
            .filter(|s| !s.is_empty())
            .ok_or(ClaimsError::MissingSubject)?;
        let subject_id = SubjectId::parse(raw_subject).map_err(|_| ClaimsError::InvalidSubject)?;

        let role = RoleCode::from(self.role.trim());
        let mut roles: Vec<RoleCode> = self
            .roles
            .unwrap_or_default()
            .into_iter()
            .map(RoleCode::from)
            .filter(|r| !r.is_empty())
            .collect();
        if roles.is_empty() && !role.is_empty() {
            roles.push(role.clone());
        }
        let role = if role.is_empty() {
            roles.first().cloned().unwrap_or(role)
        } else {
            role
        };

        Ok(Principal {
            subject_id,
            email: self.email,
            name: self.name,
            role,
            roles,
            team: self.team.filter(|t| !t.trim().is_empty()),
            claimed_permissions: self.permissions.into_iter().map(Permission::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_shape_prefers_user_id_and_derives_roles() {
        let raw: RawClaims = serde_json::from_value(json!({
            "user_id": "64b7f0c2a1e4d3b2c1a09f8e",
            "sub": "ignored",
            "email": "rep@example.com",
            "role": "sales_rep",
            "permissions": ["lead:own:read"],
        }))
        .unwrap();

        let principal = raw.normalize().unwrap();
        assert_eq!(principal.subject_id.as_str(), "64b7f0c2a1e4d3b2c1a09f8e");
        assert_eq!(principal.role.as_str(), "sales_rep");
        assert_eq!(principal.roles, vec![RoleCode::from("sales_rep")]);
        assert_eq!(principal.claimed_permissions, vec![Permission::from("lead:own:read")]);
        assert_eq!(principal.team, None);
    }

    #[test]
    fn role_array_is_kept_and_primary_role_backfilled() {
        let raw: RawClaims = serde_json::from_value(json!({
            "sub": "u1",
            "roles": ["manager", "sales_rep"],
            "team": "north",
        }))
        .unwrap();

        let principal = raw.normalize().unwrap();
        assert_eq!(principal.role.as_str(), "manager");
        assert_eq!(principal.roles.len(), 2);
        assert_eq!(principal.team.as_deref(), Some("north"));
    }

    #[test]
    fn missing_or_malformed_subject_is_rejected() {
        let raw: RawClaims = serde_json::from_value(json!({ "role": "admin" })).unwrap();
        assert_eq!(raw.normalize(), Err(ClaimsError::MissingSubject));

        let raw: RawClaims =
            serde_json::from_value(json!({ "sub": "../../etc/passwd", "role": "admin" })).unwrap();
        assert_eq!(raw.normalize(), Err(ClaimsError::InvalidSubject));
    }

    #[test]
    fn access_claims_to_principal_defaults_roles_to_primary() {
        let claims = AccessClaims {
            sub: SubjectId::parse("u1").unwrap(),
            email: "a@b.c".into(),
            name: "A".into(),
            role: RoleCode::from("admin"),
            roles: vec![],
            team: None,
            permissions: vec![Permission::super_admin()],
            iat: 0,
            exp: 1,
            iss: "warden".into(),
        };

        let principal = claims.to_principal();
        assert_eq!(principal.roles, vec![RoleCode::from("admin")]);
        assert!(principal.claims_super_admin());
    }
}
