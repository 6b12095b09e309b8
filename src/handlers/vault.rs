//! Vault HTTP handlers - deposits, holds, settlements, and history

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::{AuthenticatedCaptain, AuthenticatedRider};
use crate::state::AppState;
use crate::vault::{
    AddMoneyRequest, HistoryQuery, HoldRequest, LedgerEntry, TransactionHistory,
    TransactionStats, Vault, VaultBalance,
};

/// POST /api/vault/deposit - Credit the rider's vault
pub async fn deposit(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Json(req): Json<AddMoneyRequest>,
) -> Result<Json<Vault>, ApiError> {
    req.validate().map_err(ApiError::Validation)?;

    let vault = state
        .vault_service
        .add_money(rider.rider_id, req.amount, req.description)
        .await?;

    Ok(Json(vault))
}

/// POST /api/vault/hold - Earmark funds for a ride
pub async fn hold(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Json(req): Json<HoldRequest>,
) -> Result<Json<Vault>, ApiError> {
    req.validate().map_err(ApiError::Validation)?;

    let vault = state
        .vault_service
        .hold_for_ride(rider.rider_id, req.ride_id, req.amount)
        .await?;

    Ok(Json(vault))
}

/// POST /api/vault/release/:ride_id - Settle the hold to the captain
pub async fn release(
    State(state): State<AppState>,
    _captain: AuthenticatedCaptain,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vault>, ApiError> {
    let vault = state.vault_service.release_to_captain(ride_id).await?;
    Ok(Json(vault))
}

/// POST /api/vault/refund/:ride_id - Return the hold after cancellation
pub async fn refund(
    State(state): State<AppState>,
    _rider: AuthenticatedRider,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vault>, ApiError> {
    let vault = state.vault_service.refund_cancelled(ride_id).await?;
    Ok(Json(vault))
}

/// GET /api/vault/balance - Current balance figures
pub async fn balance(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
) -> Result<Json<VaultBalance>, ApiError> {
    let balance = state.vault_service.balance(rider.rider_id).await?;
    Ok(Json(balance))
}

/// GET /api/vault/transactions - Filtered transaction history
pub async fn transactions(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionHistory>, ApiError> {
    let history = state.vault_service.history(rider.rider_id, query).await?;
    Ok(Json(history))
}

/// GET /api/vault/transactions/:id - One ledger entry
pub async fn transaction(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let entry = state
        .vault_service
        .transaction(rider.rider_id, entry_id)
        .await?;
    Ok(Json(entry))
}

/// GET /api/vault/stats - Category and monthly aggregates
pub async fn stats(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
) -> Result<Json<TransactionStats>, ApiError> {
    let stats = state.vault_service.stats(rider.rider_id).await?;
    Ok(Json(stats))
}
