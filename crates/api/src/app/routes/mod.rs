//! Route handlers, grouped by area.

use axum::Router;

pub mod rbac;
pub mod scope;
pub mod session;
pub mod system;

/// Routes that require an authenticated [`crate::context::AuthContext`].
pub fn router() -> Router {
    Router::new()
        .merge(system::router())
        .nest("/scope", scope::router())
        .nest("/rbac", rbac::router())
}
