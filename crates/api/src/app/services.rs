//! Component wiring: one instance of each service, shared behind `Arc`.

use std::sync::Arc;

use warden_auth::Permission;
use warden_infra::AuthError;
use warden_infra::cache::{CacheStore, InMemoryCacheStore};
use warden_infra::config::AuthConfig;
use warden_infra::directory::{IdentityDirectory, InMemoryIdentityDirectory};
use warden_infra::keys::{HttpKeySetSource, KeyRotationCache};
use warden_infra::resolver::PermissionResolver;
use warden_infra::session::{InMemorySessionStore, SessionManager};
use warden_infra::store::{InMemoryPermissionStore, PermissionStore};
use warden_infra::token::{TokenService, TokenSettings};
use warden_infra::verifier::{DualAlgorithmVerifier, TokenVerifier};

use crate::middleware::AuthState;

/// Permission required to read role grants.
pub const ROLES_READ: &str = "settings:roles:read";
/// Permission required to change role grants.
pub const ROLES_WRITE: &str = "settings:roles:write";

pub struct AppServices {
    pub verifier: Arc<dyn TokenVerifier>,
    pub resolver: Arc<PermissionResolver>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub sessions: Arc<SessionManager>,
}

impl AppServices {
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            verifier: self.verifier.clone(),
            resolver: self.resolver.clone(),
            directory: self.directory.clone(),
        }
    }
}

/// Permission codes known out of the box.
pub fn default_catalog() -> Vec<Permission> {
    let mut codes = Vec::new();
    for resource in ["campaign", "lead", "contact"] {
        for scope in ["own", "team", "region", "all"] {
            for action in ["read", "write", "delete"] {
                codes.push(Permission::from(format!("{resource}:{scope}:{action}")));
            }
        }
    }
    codes.push(Permission::from(ROLES_READ));
    codes.push(Permission::from(ROLES_WRITE));
    codes
}

/// Build every service from configuration. Key material problems are fatal.
pub fn build_services(config: &AuthConfig) -> Result<AppServices, AuthError> {
    let tokens = Arc::new(TokenService::from_pem_files(
        &config.private_key_path,
        &config.public_key_path,
        TokenSettings::from_config(config),
    )?);

    let mut verifier = DualAlgorithmVerifier::new().with_local(tokens.clone());
    if let Some(url) = &config.jwks_url {
        let source = HttpKeySetSource::new(url.clone())
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let keys = KeyRotationCache::new(Arc::new(source)).with_ttl(config.jwks_ttl);
        verifier = verifier.with_rotating_keys(Arc::new(keys));
    }
    if let Some(audience) = &config.audience {
        verifier = verifier.with_audience(audience.clone());
    }
    if let Some(secret) = &config.legacy_secret {
        verifier = verifier.with_legacy_secret(secret.as_bytes());
    } else {
        tracing::info!("WARDEN_JWT_SECRET not set; legacy HS256 tokens will be rejected");
    }

    let store: Arc<dyn PermissionStore> =
        Arc::new(InMemoryPermissionStore::new().with_catalog(default_catalog()));
    let cache = build_cache(config)?;
    let resolver = Arc::new(PermissionResolver::new(store, cache).with_ttl(config.permission_cache_ttl));

    let directory: Arc<dyn IdentityDirectory> = Arc::new(InMemoryIdentityDirectory::new());
    let sessions = Arc::new(SessionManager::new(
        tokens,
        Arc::new(InMemorySessionStore::new()),
        directory.clone(),
    ));

    Ok(AppServices {
        verifier: Arc::new(verifier),
        resolver,
        directory,
        sessions,
    })
}

#[cfg(feature = "redis")]
fn build_cache(config: &AuthConfig) -> Result<Arc<dyn CacheStore>, AuthError> {
    match &config.redis_url {
        Some(url) => {
            let cache = warden_infra::redis::RedisCacheStore::new(url)
                .map_err(|e| AuthError::configuration(e.to_string()))?;
            tracing::info!("permission cache: redis");
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemoryCacheStore::new())),
    }
}

#[cfg(not(feature = "redis"))]
fn build_cache(config: &AuthConfig) -> Result<Arc<dyn CacheStore>, AuthError> {
    if config.redis_url.is_some() {
        tracing::warn!("WARDEN_REDIS_URL set but redis feature not enabled, falling back to in-memory");
    }
    Ok(Arc::new(InMemoryCacheStore::new()))
}
