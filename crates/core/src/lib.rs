//! `warden-core`: identity primitives shared by every warden crate.
//!
//! This crate contains **pure** value types (no IO, no async).

pub mod error;
pub mod id;

pub use error::CoreError;
pub use id::{SessionId, SubjectId};
