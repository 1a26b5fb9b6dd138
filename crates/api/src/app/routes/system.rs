use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};

use crate::app::dto::WhoAmIResponse;
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new().route("/whoami", get(whoami))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    let p = ctx.principal();
    Json(serde_json::json!(WhoAmIResponse {
        subject_id: p.subject_id.as_str(),
        email: &p.email,
        name: &p.name,
        role: p.role.as_str(),
        roles: p.roles.iter().map(|r| r.as_str()).collect(),
        team: p.team.as_deref(),
        verified_by: ctx.verified_by().as_str(),
        access: &ctx.access().merge,
        data_scope: ctx.data_scope(),
    }))
}
