use serde::{Deserialize, Serialize};

use warden_core::SubjectId;

use crate::{Permission, RoleCode};

/// Identity resolved from a verified token.
///
/// `claimed_permissions` is whatever the token carried at issue time. It is
/// never authoritative on its own; see [`crate::merge_permissions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: SubjectId,
    pub email: String,
    pub name: String,
    /// Primary role code. Empty when the token carried none.
    pub role: RoleCode,
    pub roles: Vec<RoleCode>,
    pub team: Option<String>,
    pub claimed_permissions: Vec<Permission>,
}

impl Principal {
    pub fn has_role(&self) -> bool {
        !self.role.is_empty()
    }

    pub fn claims_super_admin(&self) -> bool {
        self.claimed_permissions.iter().any(Permission::is_super_admin)
    }
}
