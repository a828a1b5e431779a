//! # gatekeeper-core
//!
//! Core crate for Gatekeeper. Contains the unified error system,
//! configuration schemas, the cache provider trait, and helpers for
//! bounding collaborator calls with a deadline.
//!
//! This crate has **no** internal dependencies on other Gatekeeper crates.

pub mod config;
pub mod deadline;
pub mod error;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind, ErrorResponse};
pub use result::AppResult;
