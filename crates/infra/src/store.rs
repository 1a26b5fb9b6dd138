//! Backing permission store: role grants and the permission catalog.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use warden_auth::{Permission, RoleCode, RolePermissionRecord, unknown_permissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("role not found: {0}")]
    NotFound(String),

    #[error("role already exists: {0}")]
    Conflict(String),

    #[error("permission store unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative source of role → permission grants.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Grant for `role`; an unknown role yields an empty record, not an error.
    async fn get_permissions_for_role(&self, role: &RoleCode) -> Result<RolePermissionRecord, StoreError>;

    async fn create_role(&self, record: RolePermissionRecord) -> Result<(), StoreError>;

    async fn update_role(&self, record: RolePermissionRecord) -> Result<(), StoreError>;

    async fn delete_role(&self, role: &RoleCode) -> Result<(), StoreError>;

    async fn role_exists(&self, role: &RoleCode) -> Result<bool, StoreError>;

    async fn all_permission_codes(&self) -> Result<Vec<Permission>, StoreError>;

    /// Codes in `requested` the catalog does not recognize.
    async fn validate_permissions(&self, requested: &[Permission]) -> Result<Vec<Permission>, StoreError> {
        let catalog = self.all_permission_codes().await?;
        Ok(unknown_permissions(requested, &catalog))
    }
}

/// In-memory permission store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    roles: RwLock<HashMap<RoleCode, RolePermissionRecord>>,
    catalog: RwLock<Vec<Permission>>,
    reads: AtomicU64,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog<I, P>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.extend_catalog(codes);
        self
    }

    /// Seed a role without catalog checks.
    pub fn with_role(self, record: RolePermissionRecord) -> Self {
        if let Ok(mut roles) = self.roles.write() {
            roles.insert(record.role.clone(), record);
        }
        self
    }

    /// Add codes to the catalog; duplicates are ignored.
    pub fn extend_catalog<I, P>(&self, codes: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        if let Ok(mut catalog) = self.catalog.write() {
            for code in codes {
                let code = code.into();
                if !catalog.contains(&code) {
                    catalog.push(code);
                }
            }
        }
    }

    /// How many role grants have been read.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get_permissions_for_role(&self, role: &RoleCode) -> Result<RolePermissionRecord, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        Ok(roles
            .get(role)
            .cloned()
            .unwrap_or_else(|| RolePermissionRecord::new(role.clone(), Vec::new(), Default::default())))
    }

    async fn create_role(&self, record: RolePermissionRecord) -> Result<(), StoreError> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        if roles.contains_key(&record.role) {
            return Err(StoreError::Conflict(record.role.to_string()));
        }
        roles.insert(record.role.clone(), record);
        Ok(())
    }

    async fn update_role(&self, record: RolePermissionRecord) -> Result<(), StoreError> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        match roles.get_mut(&record.role) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.role.to_string())),
        }
    }

    async fn delete_role(&self, role: &RoleCode) -> Result<(), StoreError> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        roles
            .remove(role)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(role.to_string()))
    }

    async fn role_exists(&self, role: &RoleCode) -> Result<bool, StoreError> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        Ok(roles.contains_key(role))
    }

    async fn all_permission_codes(&self) -> Result<Vec<Permission>, StoreError> {
        let catalog = self.catalog.read().map_err(|_| Self::poisoned())?;
        Ok(catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::DataScope;

    fn record(role: &str, perms: &[&str]) -> RolePermissionRecord {
        RolePermissionRecord::new(
            role,
            perms.iter().map(|p| Permission::from(*p)).collect(),
            DataScope::new(),
        )
    }

    #[tokio::test]
    async fn unknown_role_reads_as_empty_grant() {
        let store = InMemoryPermissionStore::new();
        let grant = store.get_permissions_for_role(&"ghost".into()).await.unwrap();
        assert!(grant.permissions.is_empty());
        assert_eq!(grant.role, RoleCode::from("ghost"));
    }

    #[tokio::test]
    async fn create_update_delete_lifecycle() {
        let store = InMemoryPermissionStore::new();
        let role = RoleCode::from("sales_rep");

        store.create_role(record("sales_rep", &["lead:own:read"])).await.unwrap();
        assert_eq!(
            store.create_role(record("sales_rep", &[])).await,
            Err(StoreError::Conflict("sales_rep".into()))
        );
        assert!(store.role_exists(&role).await.unwrap());

        store.update_role(record("sales_rep", &["lead:own:write"])).await.unwrap();
        let grant = store.get_permissions_for_role(&role).await.unwrap();
        assert_eq!(grant.permissions, vec![Permission::from("lead:own:write")]);

        store.delete_role(&role).await.unwrap();
        assert_eq!(store.delete_role(&role).await, Err(StoreError::NotFound("sales_rep".into())));
        assert_eq!(
            store.update_role(record("sales_rep", &[])).await,
            Err(StoreError::NotFound("sales_rep".into()))
        );
    }

    #[tokio::test]
    async fn validation_uses_the_catalog() {
        let store = InMemoryPermissionStore::new().with_catalog(["lead:own:read", "lead:own:write"]);
        let invalid = store
            .validate_permissions(&[Permission::from("lead:*:*"), Permission::from("report:own:read")])
            .await
            .unwrap();
        assert_eq!(invalid, vec![Permission::from("report:own:read")]);

        store.extend_catalog(["report:own:read", "lead:own:read"]);
        assert_eq!(store.all_permission_codes().await.unwrap().len(), 3);
    }
}
