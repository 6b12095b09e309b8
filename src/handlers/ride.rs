//! Ride lifecycle HTTP handlers
//!
//! Handlers pass service errors through untouched; the event emissions here
//! are best-effort and never affect the response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::fare::FareQuote;
use crate::handlers::{AuthenticatedCaptain, AuthenticatedRider};
use crate::ride::{
    CreateRideRequest, NegotiationHistoryEntry, Ride, RideEvent, SortedNegotiation,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FareQuoteRequest {
    pub pickup: String,
    pub destination: String,
}

/// POST /api/rides/fare - Quote fares for a trip
pub async fn quote_fare(
    State(state): State<AppState>,
    _rider: AuthenticatedRider,
    Json(req): Json<FareQuoteRequest>,
) -> Result<Json<FareQuote>, ApiError> {
    let quote = state
        .ride_service
        .quote_fare(&req.pickup, &req.destination)
        .await?;

    Ok(Json(quote))
}

/// POST /api/rides - Create a new ride
pub async fn create_ride(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Json(req): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<Ride>), ApiError> {
    let ride = state.ride_service.create_ride(rider.rider_id, req).await?;

    state.ws_state.emit(RideEvent::Created {
        ride_id: ride.id,
        rider_id: ride.rider_id,
        vehicle_class: ride.vehicle_class,
    });

    Ok((StatusCode::CREATED, Json(ride)))
}

/// GET /api/rides/:id - Fetch one ride
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state.ride_service.get_ride(ride_id).await?;
    Ok(Json(ride))
}

#[derive(Debug, Deserialize)]
pub struct PriceAdjustmentRequest {
    pub requested_amount: i64,
}

/// POST /api/rides/:id/negotiations - Captain submits a counter-offer
pub async fn request_negotiation(
    State(state): State<AppState>,
    captain: AuthenticatedCaptain,
    Path(ride_id): Path<Uuid>,
    Json(req): Json<PriceAdjustmentRequest>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .request_price_adjustment(ride_id, captain.captain_id, req.requested_amount)
        .await?;

    state.ws_state.emit(RideEvent::NegotiationRequested {
        ride_id,
        captain_id: captain.captain_id,
        requested_amount: req.requested_amount,
    });

    Ok(Json(ride))
}

/// GET /api/rides/:id/negotiations - Pending offers in rider-facing order
pub async fn list_negotiations(
    State(state): State<AppState>,
    _rider: AuthenticatedRider,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<SortedNegotiation>>, ApiError> {
    let negotiations = state.ride_service.sorted_negotiations(ride_id).await?;
    Ok(Json(negotiations))
}

/// GET /api/rides/:id/history - Audit trail of every proposed amount
pub async fn get_negotiation_history(
    State(state): State<AppState>,
    _rider: AuthenticatedRider,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<NegotiationHistoryEntry>>, ApiError> {
    let history = state.ride_service.negotiation_history(ride_id).await?;
    Ok(Json(history))
}

/// POST /api/rides/:id/negotiations/:captain_id/accept - Rider accepts an offer
pub async fn accept_negotiation(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Path((ride_id, captain_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .accept_captain_request(ride_id, rider.rider_id, captain_id)
        .await?;

    state.ws_state.emit(RideEvent::StatusChanged {
        ride_id,
        status: ride.status,
    });

    Ok(Json(ride))
}

/// POST /api/rides/:id/negotiations/reject-all - Rider rejects every offer
pub async fn reject_all_negotiations(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .reject_all_negotiations(ride_id, rider.rider_id)
        .await?;

    state.ws_state.emit(RideEvent::StatusChanged {
        ride_id,
        status: ride.status,
    });

    Ok(Json(ride))
}

/// POST /api/rides/:id/confirm - Captain confirms the ride
pub async fn confirm_ride(
    State(state): State<AppState>,
    captain: AuthenticatedCaptain,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .confirm_ride(ride_id, captain.captain_id)
        .await?;

    state.ws_state.emit(RideEvent::StatusChanged {
        ride_id,
        status: ride.status,
    });

    Ok(Json(ride))
}

#[derive(Debug, Deserialize)]
pub struct StartRideRequest {
    pub otp: String,
}

/// POST /api/rides/:id/start - Captain starts the trip
pub async fn start_ride(
    State(state): State<AppState>,
    captain: AuthenticatedCaptain,
    Path(ride_id): Path<Uuid>,
    Json(req): Json<StartRideRequest>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .start_ride(ride_id, captain.captain_id, &req.otp)
        .await?;

    state.ws_state.emit(RideEvent::StatusChanged {
        ride_id,
        status: ride.status,
    });

    Ok(Json(ride))
}

/// POST /api/rides/:id/end - Captain completes the trip
pub async fn end_ride(
    State(state): State<AppState>,
    captain: AuthenticatedCaptain,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .end_ride(ride_id, captain.captain_id)
        .await?;

    state.ws_state.emit(RideEvent::Completed {
        ride_id,
        fare_final: ride.fare_final,
    });

    Ok(Json(ride))
}

/// POST /api/rides/:id/cancel - Rider cancels the ride
pub async fn cancel_ride(
    State(state): State<AppState>,
    rider: AuthenticatedRider,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .cancel_ride(ride_id, rider.rider_id)
        .await?;

    state.ws_state.emit(RideEvent::StatusChanged {
        ride_id,
        status: ride.status,
    });

    Ok(Json(ride))
}
