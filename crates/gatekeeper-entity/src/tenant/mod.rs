//! Tenant (company) entities.

pub mod model;

pub use model::Tenant;
