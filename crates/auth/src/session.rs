use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{SessionId, SubjectId};

/// Where a session was opened from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOrigin {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Server-side record of an issued refresh token.
///
/// # Invariants
/// - Created at login.
/// - `revoked` is set at most once (by logout) and never reverted; fields are
///   private so callers cannot reset it.
/// - Expires by TTL (`expires_at`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    subject_id: SubjectId,
    refresh_token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    origin: SessionOrigin,
    revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        subject_id: SubjectId,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        origin: SessionOrigin,
    ) -> Self {
        Self {
            id,
            subject_id,
            refresh_token: refresh_token.into(),
            issued_at,
            expires_at,
            origin,
            revoked_at: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn origin(&self) -> &SessionOrigin {
        &self.origin
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Mark the session revoked. Returns `false` if it already was; the
    /// original revocation time is kept.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        self.revoked_at = Some(now);
        true
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable for a refresh: not revoked and not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}
