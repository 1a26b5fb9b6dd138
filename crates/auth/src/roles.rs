use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{DataScope, Permission};

/// Role identifier used for RBAC (e.g. `"sales_rep"`).
///
/// Roles are opaque strings at this layer; the role → permission mapping is
/// owned by the backing permission store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCode(Cow<'static, str>);

impl RoleCode {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleCode {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for RoleCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Authoritative grant of a role: its permission codes and data scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionRecord {
    pub role: RoleCode,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub data_scope: DataScope,
}

impl RolePermissionRecord {
    pub fn new(role: impl Into<RoleCode>, permissions: Vec<Permission>, data_scope: DataScope) -> Self {
        Self {
            role: role.into(),
            permissions,
            data_scope,
        }
    }
}
