//! HTTP middleware for RideVault

pub mod auth;
pub mod tracing;

pub use auth::{AuthenticatedCaptain, AuthenticatedRider, JwtSecret, PartyRole};
pub use tracing::request_tracing;
