//! Role grant administration and authorization explanations.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use warden_auth::{Permission, RoleCode};

use crate::app::AppServices;
use crate::app::dto::{CreateRoleRequest, ExplainQuery, RoleRequest};
use crate::app::errors::ApiError;
use crate::app::services::{ROLES_READ, ROLES_WRITE};
use crate::authz::{explain, require_any_permission, require_permission};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/explain", get(explain_decision))
        .route("/roles", post(create_role))
        .route("/roles/:role", get(get_role).put(update_role).delete(delete_role))
        .route("/cache/invalidate", post(invalidate_cache))
}

/// GET /rbac/explain?permission=X - why the caller can or cannot use a permission
pub async fn explain_decision(
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ExplainQuery>,
) -> impl IntoResponse {
    let explanation = explain(&ctx, &Permission::from(query.permission));
    Json(serde_json::json!({ "explanation": explanation }))
}

/// GET /rbac/roles/:role
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_any_permission(&ctx, &[Permission::from(ROLES_READ), Permission::from(ROLES_WRITE)])?;

    let record = services.resolver.get_permissions_for_role(&RoleCode::from(role)).await?;
    Ok(Json(serde_json::json!({ "role": record })))
}

/// POST /rbac/roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<CreateRoleRequest>,
) -> Result<StatusCode, ApiError> {
    require_permission(&ctx, &Permission::from(ROLES_WRITE))?;

    let record = body.grant.into_record(RoleCode::from(body.role));
    services.resolver.create_role(record).await?;
    Ok(StatusCode::CREATED)
}

/// PUT /rbac/roles/:role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role): Path<String>,
    Json(body): Json<RoleRequest>,
) -> Result<StatusCode, ApiError> {
    require_permission(&ctx, &Permission::from(ROLES_WRITE))?;

    services.resolver.update_role(body.into_record(RoleCode::from(role))).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /rbac/roles/:role
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_permission(&ctx, &Permission::from(ROLES_WRITE))?;

    services.resolver.delete_role(&RoleCode::from(role)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /rbac/cache/invalidate - drop every cached role grant
pub async fn invalidate_cache(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&ctx, &Permission::from(ROLES_WRITE))?;

    let removed = services.resolver.invalidate_all_roles().await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
