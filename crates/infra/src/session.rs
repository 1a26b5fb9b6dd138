//! Login, refresh and logout over server-side sessions.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use warden_auth::{Principal, Session, SessionOrigin};
use warden_core::{SessionId, SubjectId};

use crate::directory::IdentityDirectory;
use crate::error::AuthError;
use crate::store::StoreError;
use crate::token::TokenService;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Revoke one session. `Ok(true)` only when this call revoked it.
    async fn revoke(&self, id: SessionId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Revoke every session of a subject; returns how many changed.
    async fn revoke_all(&self, subject_id: &SubjectId, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// In-memory session store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        if sessions.contains_key(&session.id()) {
            return Err(StoreError::Conflict(session.id().to_string()));
        }
        sessions.insert(session.id(), session);
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| Self::poisoned())?;
        Ok(sessions.get(&id).cloned())
    }

    async fn revoke(&self, id: SessionId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        Ok(sessions.get_mut(&id).is_some_and(|s| s.revoke(now)))
    }

    async fn revoke_all(&self, subject_id: &SubjectId, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        let mut revoked = 0;
        for session in sessions.values_mut() {
            if session.subject_id() == subject_id && session.revoke(now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: SessionId,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: &'static str,
}

pub struct SessionManager {
    tokens: Arc<TokenService>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn IdentityDirectory>,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        tokens: Arc<TokenService>,
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            tokens,
            sessions,
            directory,
        }
    }

    /// Issue an access/refresh pair and record the session.
    pub async fn login(&self, subject: &Principal, origin: SessionOrigin) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_token = self.tokens.generate_access_token_at(subject, now)?;
        let refresh = self.tokens.generate_refresh_token_at(&subject.subject_id, now)?;

        let session = Session::new(
            refresh.session_id,
            subject.subject_id.clone(),
            refresh.token.clone(),
            refresh.issued_at,
            refresh.expires_at,
            origin,
        );
        self.sessions.insert(session).await?;

        info!(subject_id = %subject.subject_id, session_id = %refresh.session_id, "session opened");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
            session_id: refresh.session_id,
            expires_in: self.tokens.settings().access_ttl.num_seconds(),
            token_type: "Bearer",
        })
    }

    /// New access token for a live session, built from the subject's current identity.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let session = self.live_session(refresh_token, now).await?;

        let subject = self
            .directory
            .load_subject(session.subject_id())
            .await?
            .ok_or_else(|| {
                debug!(subject_id = %session.subject_id(), "refresh for unknown subject");
                AuthError::InvalidToken
            })?;

        debug!(subject_id = %subject.subject_id, session_id = %session.id(), "access token refreshed");
        self.tokens.generate_access_token_at(&subject, now)
    }

    /// Revoke the session behind a refresh token. Repeated calls are no-ops.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.tokens.decode_refresh_claims(refresh_token)?;
        let id = session_id(&claims.jti)?;

        if self.sessions.revoke(id, Utc::now()).await? {
            info!(subject_id = %claims.sub, session_id = %id, "session revoked");
        }
        Ok(())
    }

    /// Revoke every session of a subject.
    pub async fn logout_all(&self, subject_id: &SubjectId) -> Result<usize, AuthError> {
        let revoked = self.sessions.revoke_all(subject_id, Utc::now()).await?;
        info!(subject_id = %subject_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    async fn live_session(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let claims = self.tokens.decode_refresh_claims(refresh_token)?;
        let id = session_id(&claims.jti)?;

        let session = self.sessions.get(id).await?.ok_or_else(|| {
            debug!(session_id = %id, "refresh for unknown session");
            AuthError::InvalidToken
        })?;

        if !session.is_active(now) || session.refresh_token() != refresh_token || session.subject_id() != &claims.sub {
            warn!(
                session_id = %id,
                revoked = session.is_revoked(),
                "refresh rejected for inactive or mismatched session"
            );
            return Err(AuthError::InvalidToken);
        }
        Ok(session)
    }
}

fn session_id(jti: &str) -> Result<SessionId, AuthError> {
    SessionId::from_str(jti).map_err(|_| AuthError::InvalidToken)
}
