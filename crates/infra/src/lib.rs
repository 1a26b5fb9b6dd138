//! Infrastructure layer: token issuance and verification, rotating keys,
//! permission resolution, sessions, and the stores behind them.

pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod keys;
pub mod resolver;
pub mod session;
pub mod store;
pub mod token;
pub mod verifier;

/// Redis adapters (permission cache).
#[cfg(feature = "redis")]
pub mod redis;

pub use error::{AuthError, ErrorCode};
