//! Cache-aside permission resolution.
//!
//! Reads go cache → store. Misses are repopulated by a detached task with its
//! own timeout, so a slow cache never slows the request that missed. Role
//! mutations validate against the catalog, commit, then invalidate the cache
//! before returning.
//!
//! A populate task started before an invalidation must not resurrect the old
//! grant. Every invalidation bumps a generation counter; a populate task whose
//! generation is stale skips its write, or deletes what it just wrote.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use warden_auth::{
    DataScope, MergeOutcome, Permission, Principal, RoleCode, RolePermissionRecord, has_all_permissions,
    has_any_permission, has_permission, merge_permissions,
};

use crate::cache::CacheStore;
use crate::config::DEFAULT_PERMISSION_CACHE_TTL;
use crate::error::AuthError;
use crate::store::PermissionStore;

pub const ROLE_CACHE_PREFIX: &str = "warden:role_perms:";

/// Upper bound on a detached cache write.
pub const POPULATE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn role_cache_key(role: &RoleCode) -> String {
    format!("{ROLE_CACHE_PREFIX}{role}")
}

/// Cached snapshot of a role grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermissionEntry {
    pub record: RolePermissionRecord,
    pub cached_at: DateTime<Utc>,
}

/// Effective access for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub role: RoleCode,
    pub merge: MergeOutcome,
    pub data_scope: DataScope,
}

impl ResolvedAccess {
    pub fn permissions(&self) -> &[Permission] {
        &self.merge.permissions
    }
}

pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    generation: Arc<AtomicU64>,
}

impl core::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("ttl", &self.ttl)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_PERMISSION_CACHE_TTL,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Grant for `role`, from cache when possible.
    ///
    /// Cache failures are logged and fall through to the store; only a store
    /// failure is an error.
    pub async fn get_permissions_for_role(&self, role: &RoleCode) -> Result<RolePermissionRecord, AuthError> {
        let key = role_cache_key(role);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedPermissionEntry>(&raw) {
                Ok(entry) => {
                    debug!(role = %role, cached_at = %entry.cached_at, "permission cache hit");
                    return Ok(entry.record);
                }
                Err(e) => warn!(role = %role, error = %e, "discarding unreadable permission cache entry"),
            },
            Ok(None) => debug!(role = %role, "permission cache miss"),
            Err(e) => warn!(role = %role, error = %e, "permission cache read failed; using store"),
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let record = self.store.get_permissions_for_role(role).await?;
        self.populate(key, &record, generation);
        Ok(record)
    }

    pub async fn has_permission(&self, role: &RoleCode, required: &Permission) -> Result<bool, AuthError> {
        let record = self.get_permissions_for_role(role).await?;
        Ok(has_permission(&record.permissions, required))
    }

    pub async fn has_any_permission(&self, role: &RoleCode, required: &[Permission]) -> Result<bool, AuthError> {
        let record = self.get_permissions_for_role(role).await?;
        Ok(has_any_permission(&record.permissions, required))
    }

    pub async fn has_all_permissions(&self, role: &RoleCode, required: &[Permission]) -> Result<bool, AuthError> {
        let record = self.get_permissions_for_role(role).await?;
        Ok(has_all_permissions(&record.permissions, required))
    }

    /// Effective permissions and data scope for a verified principal.
    pub async fn resolve_principal(&self, principal: &Principal) -> Result<ResolvedAccess, AuthError> {
        let record = self.get_permissions_for_role(&principal.role).await?;
        let merge = merge_permissions(principal, &record.permissions);

        Ok(ResolvedAccess {
            role: principal.role.clone(),
            merge,
            data_scope: record.data_scope,
        })
    }

    pub async fn create_role(&self, record: RolePermissionRecord) -> Result<(), AuthError> {
        self.ensure_known(&record.permissions).await?;
        let role = record.role.clone();
        self.store.create_role(record).await?;
        self.invalidate_role(&role).await
    }

    pub async fn update_role(&self, record: RolePermissionRecord) -> Result<(), AuthError> {
        self.ensure_known(&record.permissions).await?;
        let role = record.role.clone();
        self.store.update_role(record).await?;
        self.invalidate_role(&role).await
    }

    pub async fn delete_role(&self, role: &RoleCode) -> Result<(), AuthError> {
        self.store.delete_role(role).await?;
        self.invalidate_role(role).await
    }

    /// Drop one role's cached grant. Retried once; a second failure is returned
    /// as `Dependency` even though the store change is already committed.
    pub async fn invalidate_role(&self, role: &RoleCode) -> Result<(), AuthError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let key = role_cache_key(role);

        let result = match self.cache.delete(&key).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(role = %role, error = %first, "permission cache invalidation failed; retrying");
                self.cache.delete(&key).await
            }
        };

        result.map_err(|e| {
            error!(role = %role, error = %e, "permission cache invalidation failed");
            AuthError::dependency(format!("cache invalidation failed for role {role}"))
        })
    }

    /// Drop every cached role grant, e.g. after a catalog-wide change.
    pub async fn invalidate_all_roles(&self) -> Result<u64, AuthError> {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let result = match self.cache.delete_prefix(ROLE_CACHE_PREFIX).await {
            Ok(n) => Ok(n),
            Err(first) => {
                warn!(error = %first, "bulk permission cache invalidation failed; retrying");
                self.cache.delete_prefix(ROLE_CACHE_PREFIX).await
            }
        };

        match result {
            Ok(n) => {
                debug!(removed = n, "permission cache cleared");
                Ok(n)
            }
            Err(e) => {
                error!(error = %e, "bulk permission cache invalidation failed");
                Err(AuthError::dependency("bulk cache invalidation failed"))
            }
        }
    }

    async fn ensure_known(&self, requested: &[Permission]) -> Result<(), AuthError> {
        let unknown = self.store.validate_permissions(requested).await?;
        if unknown.is_empty() {
            return Ok(());
        }
        let codes: Vec<String> = unknown.iter().map(|p| p.as_str().to_string()).collect();
        debug!(codes = ?codes, "rejecting role mutation with unknown permission codes");
        Err(AuthError::UnknownPermissions(codes))
    }

    fn populate(&self, key: String, record: &RolePermissionRecord, generation: u64) {
        let entry = CachedPermissionEntry {
            record: record.clone(),
            cached_at: Utc::now(),
        };
        let value = match serde_json::to_string(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "permission cache entry not serializable");
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.generation);
        let ttl = self.ttl;

        tokio::spawn(async move {
            if current.load(Ordering::SeqCst) != generation {
                debug!(key = %key, "skipping cache populate after invalidation");
                return;
            }

            match tokio::time::timeout(POPULATE_TIMEOUT, cache.set(&key, value, ttl)).await {
                Ok(Ok(())) => {
                    if current.load(Ordering::SeqCst) != generation {
                        debug!(key = %key, "invalidation raced cache populate; removing entry");
                        if let Err(e) = cache.delete(&key).await {
                            warn!(key = %key, error = %e, "failed to remove raced cache entry");
                        }
                    }
                }
                Ok(Err(e)) => warn!(key = %key, error = %e, "permission cache populate failed"),
                Err(_) => warn!(key = %key, "permission cache populate timed out"),
            }
        });
    }
}
