//! API handlers for RideVault

pub mod ride;
pub mod vault;

pub use ride::*;
pub use vault::*;

// Re-export identity extractors for handler use
pub use crate::middleware::{AuthenticatedCaptain, AuthenticatedRider};
