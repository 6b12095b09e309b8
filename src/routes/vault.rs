//! Vault route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn vault_routes() -> Router<AppState> {
    Router::new()
        .route("/api/vault/deposit", post(deposit))
        .route("/api/vault/hold", post(hold))
        .route("/api/vault/release/:ride_id", post(release))
        .route("/api/vault/refund/:ride_id", post(refund))
        .route("/api/vault/balance", get(balance))
        .route("/api/vault/transactions", get(transactions))
        .route("/api/vault/transactions/:id", get(transaction))
        .route("/api/vault/stats", get(stats))
}
