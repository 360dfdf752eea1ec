//! # authapi_core
//!
//! Session credential issuance and renewal, plus role assignment
//! reconciliation for administrative role management.

pub mod auth;
pub mod config;
pub mod models;
pub mod roles;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
