//! Data-scope inspection: the predicate the query layer would receive.

use axum::{
    Extension, Json, Router,
    extract::Path,
    response::IntoResponse,
    routing::get,
};

use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new().route("/:resource", get(scope_for_resource))
}

/// GET /scope/:resource
pub async fn scope_for_resource(
    Extension(ctx): Extension<AuthContext>,
    Path(resource): Path<String>,
) -> impl IntoResponse {
    let level = ctx.data_scope().level_for(&resource);
    let decision = ctx.scope_decision(&resource);

    Json(serde_json::json!({
        "resource": resource,
        "level": level.as_str(),
        "decision": decision,
    }))
}
