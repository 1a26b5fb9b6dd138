use warden_auth::{DataScope, Filter, Permission, Principal, ScopeClaims, ScopeDecision, ScopedRecord};
use warden_core::SubjectId;
use warden_infra::resolver::ResolvedAccess;
use warden_infra::verifier::VerifiedBy;

/// Authenticated, resolved request identity.
///
/// Inserted by [`crate::middleware::auth_middleware`] after verification,
/// permission resolution and scope lookup have all succeeded. Immutable for
/// the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    principal: Principal,
    access: ResolvedAccess,
    scope_claims: ScopeClaims,
    verified_by: VerifiedBy,
}

impl AuthContext {
    pub fn new(
        principal: Principal,
        access: ResolvedAccess,
        scope_claims: ScopeClaims,
        verified_by: VerifiedBy,
    ) -> Self {
        Self {
            principal,
            access,
            scope_claims,
            verified_by,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.principal.subject_id
    }

    /// Effective permissions after merging the store grant with token claims.
    pub fn permissions(&self) -> &[Permission] {
        self.access.permissions()
    }

    pub fn access(&self) -> &ResolvedAccess {
        &self.access
    }

    pub fn data_scope(&self) -> &DataScope {
        &self.access.data_scope
    }

    pub fn scope_claims(&self) -> &ScopeClaims {
        &self.scope_claims
    }

    pub fn wildcard_override(&self) -> bool {
        self.access.merge.wildcard_override
    }

    pub fn verified_by(&self) -> VerifiedBy {
        self.verified_by
    }

    pub fn scope_decision(&self, resource: &str) -> ScopeDecision {
        self.data_scope().decision_for(resource, &self.scope_claims)
    }

    /// Predicate for list queries over `resource`.
    pub fn scope_filter(&self, resource: &str) -> Filter {
        self.scope_decision(resource).filter()
    }

    /// Whether a single record of `resource` is visible to this subject.
    pub fn can_access<R: ScopedRecord + ?Sized>(&self, resource: &str, record: &R) -> bool {
        self.scope_decision(resource).permits(record)
    }
}
