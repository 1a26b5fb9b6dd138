//! HTTP surface: bearer authentication, permission resolution and data-scope
//! injection as axum middleware, plus a small set of routes over them.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
