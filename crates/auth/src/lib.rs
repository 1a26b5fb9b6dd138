//! `warden-auth`: pure authorization policy (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP, storage and key material.
//! Everything here is deterministic: token verification, caching and stores
//! live in `warden-infra`.

pub mod authorize;
pub mod claims;
pub mod merge;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod scope;
pub mod session;

pub use authorize::{AuthorizationExplanation, AuthzError, authorize, explain_authorization};
pub use claims::{AccessClaims, ClaimsError, RawClaims, RefreshClaims};
pub use merge::{MergeOutcome, PermissionSource, merge_permissions};
pub use permissions::{
    Permission, has_all_permissions, has_any_permission, has_permission, unknown_permissions,
};
pub use principal::Principal;
pub use roles::{RoleCode, RolePermissionRecord};
pub use scope::{
    Condition, DataScope, FieldKind, Filter, ResourceCategory, ScopeClaims, ScopeDecision,
    ScopeLevel, ScopedRecord, build_filter, check_access,
};
pub use session::{Session, SessionOrigin};
