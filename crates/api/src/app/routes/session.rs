//! Refresh-token exchange and logout. Public: the refresh token is the credential.

use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, routing::post};

use crate::app::AppServices;
use crate::app::dto::{AccessTokenResponse, RefreshTokenRequest};
use crate::app::errors::ApiError;

pub fn router() -> Router {
    Router::new()
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

/// POST /auth/refresh
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let access_token = services.sessions.refresh(&body.refresh_token).await?;
    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "Bearer",
    }))
}

/// POST /auth/logout
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<StatusCode, ApiError> {
    services.sessions.logout(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
