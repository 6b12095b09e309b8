//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::middleware::JwtSecret;
use crate::ride::RideService;
use crate::vault::VaultService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ride_service: Arc<RideService>,
    pub vault_service: Arc<VaultService>,
    pub ws_state: WsState,
    pub jwt_secret: JwtSecret,
}

impl AppState {
    pub fn new(
        ride_service: Arc<RideService>,
        vault_service: Arc<VaultService>,
        ws_state: WsState,
        jwt_secret: String,
    ) -> Self {
        Self {
            ride_service,
            vault_service,
            ws_state,
            jwt_secret: JwtSecret(jwt_secret),
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<RideService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ride_service.clone()
    }
}

impl FromRef<AppState> for Arc<VaultService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.vault_service.clone()
    }
}

impl FromRef<AppState> for JwtSecret {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt_secret.clone()
    }
}
