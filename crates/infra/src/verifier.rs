//! Dual-algorithm bearer token verification.
//!
//! Order of attempts:
//! 1. the local RS256 key, when the header `kid` names it
//! 2. the rotating JWKS keys, by header `kid`
//! 3. the legacy HS256 shared secret
//!
//! Any failure on an RS256 path falls through to the legacy scheme. Claims
//! from every path are normalized into one [`Principal`] shape. The local path
//! only accepts access-token claims, so warden's own refresh tokens never
//! authenticate a request.
//!
//! `aud` is checked only when an expected audience is configured.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::debug;

use warden_auth::{AccessClaims, Principal, RawClaims};

use crate::error::AuthError;
use crate::keys::KeyRotationCache;
use crate::token::{ACCESS_ALGORITHM, TokenService};

/// Which scheme accepted a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedBy {
    Local,
    Rotating,
    Legacy,
}

impl VerifiedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Rotating => "rotating",
            Self::Legacy => "legacy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub principal: Principal,
    pub verified_by: VerifiedBy,
}

/// Turns a bearer string into a normalized identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

pub struct DualAlgorithmVerifier {
    local: Option<Arc<TokenService>>,
    rotating: Option<Arc<KeyRotationCache>>,
    legacy: Option<DecodingKey>,
    audience: Option<String>,
    leeway_secs: u64,
}

impl core::fmt::Debug for DualAlgorithmVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DualAlgorithmVerifier")
            .field("local", &self.local.is_some())
            .field("rotating", &self.rotating.is_some())
            .field("legacy", &self.legacy.is_some())
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for DualAlgorithmVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DualAlgorithmVerifier {
    /// A verifier with no schemes enabled; every token is rejected.
    pub fn new() -> Self {
        Self {
            local: None,
            rotating: None,
            legacy: None,
            audience: None,
            leeway_secs: 30,
        }
    }

    pub fn with_local(mut self, tokens: Arc<TokenService>) -> Self {
        self.local = Some(tokens);
        self
    }

    pub fn with_rotating_keys(mut self, keys: Arc<KeyRotationCache>) -> Self {
        self.rotating = Some(keys);
        self
    }

    pub fn with_legacy_secret(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.legacy = Some(DecodingKey::from_secret(secret.as_ref()));
        self
    }

    /// Require `aud` to contain `audience` on the RS256 and legacy paths.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| {
            debug!(reason = %e, "token header unreadable");
            AuthError::InvalidToken
        })?;

        let (principal, verified_by) = match self.verify_asymmetric(token, header.kid.as_deref()).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, kid = ?header.kid, "RS256 verification failed; trying legacy secret");
                (normalize(self.verify_legacy(token)?)?, VerifiedBy::Legacy)
            }
        };

        debug!(
            subject_id = %principal.subject_id,
            verified_by = verified_by.as_str(),
            "token verified"
        );
        Ok(VerifiedToken {
            principal,
            verified_by,
        })
    }

    async fn verify_asymmetric(
        &self,
        token: &str,
        kid: Option<&str>,
    ) -> Result<(Principal, VerifiedBy), AuthError> {
        if let Some(local) = &self.local {
            if local.key_id() == kid {
                return local
                    .decode_claims::<AccessClaims>(token)
                    .map(|claims| (claims.to_principal(), VerifiedBy::Local));
            }
        }

        let rotating = self
            .rotating
            .as_ref()
            .ok_or_else(|| AuthError::configuration("rotating keys disabled"))?;
        let kid = kid.ok_or_else(|| AuthError::malformed("token header has no kid"))?;
        let key = rotating
            .get_public_key(kid)
            .await
            .map_err(|_| AuthError::KeyNotFound(kid.to_string()))?;

        let raw = self.decode(token, &key, ACCESS_ALGORITHM)?;
        Ok((normalize(raw)?, VerifiedBy::Rotating))
    }

    fn verify_legacy(&self, token: &str) -> Result<RawClaims, AuthError> {
        let secret = self.legacy.as_ref().ok_or(AuthError::InvalidToken)?;
        self.decode(token, secret, Algorithm::HS256)
    }

    fn decode(&self, token: &str, key: &DecodingKey, alg: Algorithm) -> Result<RawClaims, AuthError> {
        let mut validation = Validation::new(alg);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = self.leeway_secs;
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        jsonwebtoken::decode::<RawClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(reason = %e, alg = ?alg, "token rejected");
                AuthError::InvalidToken
            })
    }
}

fn normalize(raw: RawClaims) -> Result<Principal, AuthError> {
    raw.normalize().map_err(|e| {
        debug!(reason = %e, "token claims rejected");
        AuthError::InvalidToken
    })
}

#[async_trait]
impl TokenVerifier for DualAlgorithmVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.verify_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{HttpKeySetSource, JwkSet, KeySetError, KeySetSource};
    use crate::token::TokenSettings;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::{Value, json};
    use warden_auth::{Permission, RoleCode};
    use warden_core::SubjectId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/signing_private.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../tests/fixtures/signing_public.pem");
    const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/other_private.pem");
    const JWKS: &str = include_str!("../tests/fixtures/jwks.json");
    const LEGACY_SECRET: &str = "legacy-shared-secret";

    struct FixedSource(JwkSet);

    #[async_trait]
    impl KeySetSource for FixedSource {
        async fn fetch(&self) -> Result<JwkSet, KeySetError> {
            Ok(self.0.clone())
        }
    }

    fn rotating_keys() -> Arc<KeyRotationCache> {
        let set: JwkSet = serde_json::from_str(JWKS).unwrap();
        Arc::new(KeyRotationCache::new(Arc::new(FixedSource(set))))
    }

    fn verifier() -> DualAlgorithmVerifier {
        DualAlgorithmVerifier::new()
            .with_rotating_keys(rotating_keys())
            .with_legacy_secret(LEGACY_SECRET)
    }

    fn legacy_claims(exp_offset: i64) -> Value {
        json!({
            "user_id": "64b7f0c2a1e4d3b2c1a09f8e",
            "email": "rep@example.com",
            "name": "Sales Rep",
            "role": "sales_rep",
            "team": "north",
            "permissions": ["lead:own:read"],
            "exp": Utc::now().timestamp() + exp_offset,
        })
    }

    fn rs256(claims: &Value, private_pem: &[u8], kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(private_pem).unwrap();
        jsonwebtoken::encode(&header, claims, &key).unwrap()
    }

    fn hs256(claims: &Value, secret: &str) -> String {
        let key = EncodingKey::from_secret(secret.as_bytes());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key).unwrap()
    }

    #[tokio::test]
    async fn rotating_key_verifies_and_normalizes_legacy_shape() {
        let token = rs256(&legacy_claims(600), PRIVATE_PEM, Some("test-key-1"));
        let verified = verifier().verify_token(&token).await.unwrap();

        assert_eq!(verified.verified_by, VerifiedBy::Rotating);
        let p = verified.principal;
        assert_eq!(p.subject_id.as_str(), "64b7f0c2a1e4d3b2c1a09f8e");
        assert_eq!(p.role, RoleCode::from("sales_rep"));
        assert_eq!(p.roles, vec![RoleCode::from("sales_rep")]);
        assert_eq!(p.team.as_deref(), Some("north"));
        assert_eq!(p.claimed_permissions, vec![Permission::from("lead:own:read")]);
    }

    #[tokio::test]
    async fn local_kid_skips_the_key_set() {
        let settings = TokenSettings {
            key_id: Some("local-1".into()),
            ..TokenSettings::default()
        };
        let local = Arc::new(TokenService::from_rsa_pem(PRIVATE_PEM, PUBLIC_PEM, settings).unwrap());
        let principal = Principal {
            subject_id: SubjectId::parse("user-42").unwrap(),
            email: "ops@example.com".into(),
            name: "Ops".into(),
            role: RoleCode::from("admin"),
            roles: vec![RoleCode::from("admin")],
            team: None,
            claimed_permissions: vec![Permission::super_admin()],
        };
        let token = local.generate_access_token(&principal).unwrap();

        let verified = DualAlgorithmVerifier::new()
            .with_local(local)
            .verify_token(&token)
            .await
            .unwrap();

        assert_eq!(verified.verified_by, VerifiedBy::Local);
        assert_eq!(verified.principal, principal);
    }

    #[tokio::test]
    async fn local_refresh_token_is_not_a_bearer_credential() {
        let local = Arc::new(TokenService::from_rsa_pem(PRIVATE_PEM, PUBLIC_PEM, TokenSettings::default()).unwrap());
        let refresh = local
            .generate_refresh_token(&SubjectId::parse("user-42").unwrap())
            .unwrap();

        let verifier = DualAlgorithmVerifier::new()
            .with_local(local)
            .with_legacy_secret(LEGACY_SECRET);

        assert!(matches!(verifier.verify_token(&refresh.token).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn audience_is_ignored_unless_configured() {
        let mut claims = legacy_claims(600);
        claims["aud"] = json!("crm-api");
        let token = rs256(&claims, PRIVATE_PEM, Some("test-key-1"));

        let verified = verifier().verify_token(&token).await.unwrap();
        assert_eq!(verified.verified_by, VerifiedBy::Rotating);

        let expecting = |aud: &str| verifier().with_audience(aud);
        assert!(expecting("crm-api").verify_token(&token).await.is_ok());
        assert!(matches!(
            expecting("billing-api").verify_token(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn hs256_falls_back_to_legacy_secret() {
        let token = hs256(&legacy_claims(600), LEGACY_SECRET);
        let verified = verifier().verify_token(&token).await.unwrap();
        assert_eq!(verified.verified_by, VerifiedBy::Legacy);
    }

    #[tokio::test]
    async fn hs256_is_rejected_without_a_legacy_secret() {
        let token = hs256(&legacy_claims(600), LEGACY_SECRET);
        let verifier = DualAlgorithmVerifier::new().with_rotating_keys(rotating_keys());
        assert!(matches!(verifier.verify_token(&token).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn both_paths_failing_is_invalid_token() {
        // Right kid, wrong signing key.
        let forged = rs256(&legacy_claims(600), OTHER_PRIVATE_PEM, Some("test-key-1"));
        assert!(matches!(verifier().verify_token(&forged).await, Err(AuthError::InvalidToken)));

        let wrong_secret = hs256(&legacy_claims(600), "not-the-secret");
        assert!(matches!(verifier().verify_token(&wrong_secret).await, Err(AuthError::InvalidToken)));

        let unknown_kid = rs256(&legacy_claims(600), PRIVATE_PEM, Some("retired-key"));
        assert!(matches!(verifier().verify_token(&unknown_kid).await, Err(AuthError::InvalidToken)));

        assert!(matches!(verifier().verify_token("not-a-jwt").await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_tokens_fail_on_either_path() {
        let rs = rs256(&legacy_claims(-3600), PRIVATE_PEM, Some("test-key-1"));
        let hs = hs256(&legacy_claims(-3600), LEGACY_SECRET);

        assert!(matches!(verifier().verify_token(&rs).await, Err(AuthError::InvalidToken)));
        assert!(matches!(verifier().verify_token(&hs).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn malformed_subject_is_rejected() {
        let mut claims = legacy_claims(600);
        claims["user_id"] = json!("has spaces; drop table");
        let token = hs256(&claims, LEGACY_SECRET);

        assert!(matches!(verifier().verify_token(&token).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn keys_are_fetched_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpKeySetSource::new(format!("{}/.well-known/jwks.json", server.uri())).unwrap();
        let keys = Arc::new(KeyRotationCache::new(Arc::new(source)));
        let verifier = DualAlgorithmVerifier::new().with_rotating_keys(keys);

        for _ in 0..3 {
            let token = rs256(&legacy_claims(600), PRIVATE_PEM, Some("test-key-1"));
            let verified = verifier.verify_token(&token).await.unwrap();
            assert_eq!(verified.verified_by, VerifiedBy::Rotating);
        }
    }

    #[tokio::test]
    async fn unreachable_key_endpoint_still_allows_legacy_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpKeySetSource::new(server.uri()).unwrap();
        let verifier = DualAlgorithmVerifier::new()
            .with_rotating_keys(Arc::new(KeyRotationCache::new(Arc::new(source))))
            .with_legacy_secret(LEGACY_SECRET);

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-key-1".into());
        let key = EncodingKey::from_secret(LEGACY_SECRET.as_bytes());
        let token = jsonwebtoken::encode(&header, &legacy_claims(600), &key).unwrap();

        assert_eq!(verifier.verify_token(&token).await.unwrap().verified_by, VerifiedBy::Legacy);
    }
}
