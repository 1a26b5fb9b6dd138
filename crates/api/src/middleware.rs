use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};

use warden_infra::directory::IdentityDirectory;
use warden_infra::resolver::PermissionResolver;
use warden_infra::verifier::TokenVerifier;
use warden_infra::AuthError;

use crate::app::errors::ApiError;
use crate::context::AuthContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub resolver: Arc<PermissionResolver>,
    pub directory: Arc<dyn IdentityDirectory>,
}

/// verify → resolve → scope; inserts [`AuthContext`] or short-circuits with
/// the matching error code.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Owned: the request body is not Sync, so no borrow of `req` may cross an await.
    let token = extract_bearer(req.headers())?.to_owned();

    let verified = state.verifier.verify(&token).await?;
    let principal = verified.principal;

    if !principal.has_role() {
        return Err(AuthError::from(warden_auth::AuthzError::RoleRequired).into());
    }

    let access = state.resolver.resolve_principal(&principal).await?;
    let scope_claims = state
        .directory
        .scope_claims(&principal)
        .await
        .map_err(AuthError::from)?;

    tracing::debug!(
        subject_id = %principal.subject_id,
        role = %principal.role,
        verified_by = verified.verified_by.as_str(),
        permission_source = ?access.merge.source,
        "request authenticated"
    );

    req.extensions_mut().insert(AuthContext::new(
        principal,
        access,
        scope_claims,
        verified.verified_by,
    ));

    Ok(next.run(req).await)
}

/// Bearer credential from the `Authorization` header.
///
/// An absent or blank header is `MissingToken`; anything else that is not
/// `Bearer <header>.<payload>.<signature>` is `MalformedInput`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let header = header
        .to_str()
        .map_err(|_| AuthError::malformed("authorization header is not ASCII"))?
        .trim();
    if header.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AuthError::malformed("authorization header has no scheme"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::malformed("authorization scheme is not Bearer"));
    }

    let token = token.trim();
    if token.split('.').count() != 3 || token.split('.').any(str::is_empty) {
        return Err(AuthError::malformed("token is not a three-segment JWS"));
    }

    Ok(token)
}
