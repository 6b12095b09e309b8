//! RideVault server library
//!
//! Core modules for the ride lifecycle and vault ledger service.

pub mod config;
pub mod db;
pub mod error;
pub mod fare;
pub mod handlers;
pub mod middleware;
pub mod ride;
pub mod routes;
pub mod routing;
pub mod state;
pub mod vault;
pub mod websocket;
