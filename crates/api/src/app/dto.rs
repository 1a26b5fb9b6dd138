use serde::{Deserialize, Serialize};

use warden_auth::{DataScope, MergeOutcome, Permission, RoleCode, RolePermissionRecord};

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub permissions: Vec<String>,
    #[serde(default)]
    pub data_scope: DataScope,
}

impl RoleRequest {
    pub fn into_record(self, role: RoleCode) -> RolePermissionRecord {
        let permissions = self.permissions.into_iter().map(Permission::from).collect();
        RolePermissionRecord::new(role, permissions, self.data_scope)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub role: String,
    #[serde(flatten)]
    pub grant: RoleRequest,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse<'a> {
    pub subject_id: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub roles: Vec<&'a str>,
    pub team: Option<&'a str>,
    pub verified_by: &'static str,
    #[serde(flatten)]
    pub access: &'a MergeOutcome,
    pub data_scope: &'a DataScope,
}
