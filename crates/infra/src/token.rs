//! RS256 access/refresh token issuance and validation.

use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use tracing::debug;

use warden_auth::{AccessClaims, Principal, RefreshClaims};
use warden_core::{SessionId, SubjectId};

use crate::error::AuthError;

/// The only algorithm locally issued tokens are signed and accepted with.
pub const ACCESS_ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    /// Written into the header so rotating-key verifiers can select the key.
    pub key_id: Option<String>,
    pub access_ttl: ChronoDuration,
    pub refresh_ttl: ChronoDuration,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: crate::config::DEFAULT_ISSUER.to_string(),
            key_id: None,
            access_ttl: ChronoDuration::minutes(crate::config::DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_ttl: ChronoDuration::days(crate::config::DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            leeway_secs: 30,
        }
    }
}

impl TokenSettings {
    pub fn from_config(config: &crate::config::AuthConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            key_id: config.key_id.clone(),
            access_ttl: ChronoDuration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: ChronoDuration::days(config.refresh_token_ttl_days),
            ..Self::default()
        }
    }
}

/// A freshly minted refresh token and the session it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub session_id: SessionId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates warden's own RS256 tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    settings: TokenSettings,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build from PEM-encoded RSA keys. Key problems are configuration failures.
    pub fn from_rsa_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        settings: TokenSettings,
    ) -> Result<Self, AuthError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| AuthError::configuration(format!("unreadable private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| AuthError::configuration(format!("unreadable public key: {e}")))?;

        Ok(Self {
            encoding,
            decoding,
            settings,
        })
    }

    pub fn from_pem_files(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
        settings: TokenSettings,
    ) -> Result<Self, AuthError> {
        let read = |path: &Path| {
            std::fs::read(path)
                .map_err(|e| AuthError::configuration(format!("cannot read {}: {e}", path.display())))
        };
        let private_pem = read(private_path.as_ref())?;
        let public_pem = read(public_path.as_ref())?;
        Self::from_rsa_pem(&private_pem, &public_pem, settings)
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    pub fn key_id(&self) -> Option<&str> {
        self.settings.key_id.as_deref()
    }

    pub fn generate_access_token(&self, subject: &Principal) -> Result<String, AuthError> {
        self.generate_access_token_at(subject, Utc::now())
    }

    pub fn generate_access_token_at(
        &self,
        subject: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims {
            sub: subject.subject_id.clone(),
            email: subject.email.clone(),
            name: subject.name.clone(),
            role: subject.role.clone(),
            roles: subject.roles.clone(),
            team: subject.team.clone(),
            permissions: subject.claimed_permissions.clone(),
            iat: now.timestamp(),
            exp: (now + self.settings.access_ttl).timestamp(),
            iss: self.settings.issuer.clone(),
        };
        self.sign(&claims)
    }

    pub fn generate_refresh_token(&self, subject_id: &SubjectId) -> Result<IssuedRefreshToken, AuthError> {
        self.generate_refresh_token_at(subject_id, Utc::now())
    }

    pub fn generate_refresh_token_at(
        &self,
        subject_id: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, AuthError> {
        let session_id = SessionId::new();
        let expires_at = now + self.settings.refresh_ttl;
        let claims = RefreshClaims {
            sub: subject_id.clone(),
            jti: session_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.settings.issuer.clone(),
        };

        Ok(IssuedRefreshToken {
            token: self.sign(&claims)?,
            session_id,
            issued_at: now,
            expires_at,
        })
    }

    /// Parsed claims iff the signature, algorithm, issuer and expiry all check out.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.decode_claims(token)
    }

    /// Subject of a valid refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<SubjectId, AuthError> {
        self.decode_refresh_claims(token).map(|c| c.sub)
    }

    pub fn decode_refresh_claims(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.decode_claims(token)
    }

    fn sign<T: serde::Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let mut header = Header::new(ACCESS_ALGORITHM);
        header.kid = self.settings.key_id.clone();
        jsonwebtoken::encode(&header, claims, &self.encoding)
            .map_err(|e| AuthError::configuration(format!("token signing failed: {e}")))
    }

    /// Decode any claim shape under the local key's rules (RS256, issuer, expiry).
    pub fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let mut validation = Validation::new(ACCESS_ALGORITHM);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = self.settings.leeway_secs;

        jsonwebtoken::decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                // The reason stays in logs; callers only see InvalidToken.
                debug!(reason = %e, "token rejected");
                AuthError::InvalidToken
            })
    }
}
