//! Ride route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn ride_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rides/fare", post(quote_fare))
        .route("/api/rides", post(create_ride))
        .route("/api/rides/:id", get(get_ride))
        .route(
            "/api/rides/:id/negotiations",
            post(request_negotiation).get(list_negotiations),
        )
        .route("/api/rides/:id/history", get(get_negotiation_history))
        .route(
            "/api/rides/:id/negotiations/:captain_id/accept",
            post(accept_negotiation),
        )
        .route(
            "/api/rides/:id/negotiations/reject-all",
            post(reject_all_negotiations),
        )
        .route("/api/rides/:id/confirm", post(confirm_ride))
        .route("/api/rides/:id/start", post(start_ride))
        .route("/api/rides/:id/end", post(end_ride))
        .route("/api/rides/:id/cancel", post(cancel_ride))
}
