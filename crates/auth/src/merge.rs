//! Reconciling token-carried permissions with the authoritative store grant.

use serde::Serialize;
use tracing::warn;

use crate::{Permission, Principal};

/// Where the effective permission list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    /// The backing store grant.
    Store,
    /// The role has no configured grant yet; the token's snapshot is used.
    ClaimsFallback,
}

/// Effective permissions for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub permissions: Vec<Permission>,
    pub source: PermissionSource,
    /// The token's super-admin wildcard was kept although the store omits it.
    pub wildcard_override: bool,
}

/// Merge the store grant for a role with the token's claimed permissions.
///
/// - store empty: the claimed permissions are used so already-issued tokens
///   keep working for roles that are not configured yet
/// - store non-empty: the store wins; broader claims are dropped
/// - store non-empty and the token claims the super-admin wildcard: the
///   wildcard is force-included and the override is logged
pub fn merge_permissions(principal: &Principal, stored: &[Permission]) -> MergeOutcome {
    if stored.is_empty() {
        return MergeOutcome {
            permissions: principal.claimed_permissions.clone(),
            source: PermissionSource::ClaimsFallback,
            wildcard_override: false,
        };
    }

    let mut permissions = stored.to_vec();
    let mut wildcard_override = false;

    if principal.claims_super_admin() && !stored.iter().any(Permission::is_super_admin) {
        warn!(
            subject_id = %principal.subject_id,
            role = %principal.role,
            "store grant omits super-admin wildcard carried by token; keeping wildcard"
        );
        permissions.push(Permission::super_admin());
        wildcard_override = true;
    }

    MergeOutcome {
        permissions,
        source: PermissionSource::Store,
        wildcard_override,
    }
}
