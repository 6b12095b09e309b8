//! Route definitions for the RideVault API

mod ride;
mod vault;

pub use ride::ride_routes;
pub use vault::vault_routes;
