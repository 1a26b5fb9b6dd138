//! Subject lookups that tokens do not carry: current identity and the
//! attributes scope rules consult (team roster, region).

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use warden_auth::{Principal, ScopeClaims};
use warden_core::SubjectId;

use crate::store::StoreError;

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Current identity of a subject, or `None` if it no longer exists.
    async fn load_subject(&self, subject_id: &SubjectId) -> Result<Option<Principal>, StoreError>;

    /// Scope attributes for a verified principal.
    async fn scope_claims(&self, principal: &Principal) -> Result<ScopeClaims, StoreError>;
}

#[derive(Debug, Clone, Default)]
struct DirectoryEntry {
    principal: Option<Principal>,
    region: Option<String>,
}

/// In-memory identity directory.
///
/// Intended for tests/dev. Team rosters are derived from the registered
/// principals' `team` field.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    entries: RwLock<HashMap<SubjectId, DirectoryEntry>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(self, principal: Principal) -> Self {
        self.upsert(principal);
        self
    }

    pub fn with_region(self, subject_id: &SubjectId, region: impl Into<String>) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(subject_id.clone()).or_default().region = Some(region.into());
        }
        self
    }

    pub fn upsert(&self, principal: Principal) {
        if let Ok(mut entries) = self.entries.write() {
            let id = principal.subject_id.clone();
            entries.entry(id).or_default().principal = Some(principal);
        }
    }

    pub fn remove(&self, subject_id: &SubjectId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(subject_id);
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn load_subject(&self, subject_id: &SubjectId) -> Result<Option<Principal>, StoreError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(subject_id).and_then(|e| e.principal.clone()))
    }

    async fn scope_claims(&self, principal: &Principal) -> Result<ScopeClaims, StoreError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        let mut claims = ScopeClaims::new(principal.subject_id.clone());
        if let Some(region) = entries.get(&principal.subject_id).and_then(|e| e.region.clone()) {
            claims = claims.with_region(region);
        }

        let Some(team) = principal.team.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(claims);
        };

        let mut members: BTreeSet<SubjectId> = entries
            .values()
            .filter_map(|e| e.principal.as_ref())
            .filter(|p| p.team.as_deref() == Some(team))
            .map(|p| p.subject_id.clone())
            .collect();
        members.insert(principal.subject_id.clone());

        Ok(claims.with_team(team, members))
    }
}
