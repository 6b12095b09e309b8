//! Ride service layer - lifecycle and fare-negotiation business logic
//!
//! Every status-gated mutation is a conditional UPDATE checked through
//! `rows_affected`, so two requests racing on the same ride serialize at the
//! row: the loser observes zero rows and fails with a precise error kind
//! while the record stays untouched. Negotiation appends are inserts into
//! their own table, never a rewrite of a list, so concurrent captains cannot
//! lose each other's offers.

use std::sync::Arc;

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::FareConfig;
use crate::error::{ApiError, ApiResult};
use crate::fare::{self, VehicleClass};
use crate::ride::model::{
    CreateRideRequest, NegotiationHistoryEntry, Ride, RideStatus, SortedNegotiation,
};
use crate::routing::RouteLookup;

/// Name of the partial unique index guarding one pending offer per captain
const PENDING_NEGOTIATION_IDX: &str = "negotiations_one_pending_per_captain";

/// Ride service managing the trip lifecycle
pub struct RideService {
    db_pool: PgPool,
    routing: Arc<dyn RouteLookup>,
    fare_config: FareConfig,
}

impl RideService {
    pub fn new(db_pool: PgPool, routing: Arc<dyn RouteLookup>, fare_config: FareConfig) -> Self {
        Self {
            db_pool,
            routing,
            fare_config,
        }
    }

    /// Quote fares for a trip without creating a ride
    pub async fn quote_fare(&self, pickup: &str, destination: &str) -> ApiResult<fare::FareQuote> {
        fare::calculate_ride_fare(&self.fare_config, self.routing.as_ref(), pickup, destination)
            .await
    }

    /// Create a ride in `pending` with its fare triple and starting-price
    /// history entry
    pub async fn create_ride(&self, rider_id: Uuid, request: CreateRideRequest) -> ApiResult<Ride> {
        request.validate().map_err(ApiError::Validation)?;

        let quote = self
            .quote_fare(&request.pickup, &request.destination)
            .await?;
        let base_fare = quote.base_fares.for_class(request.vehicle_class);

        let negotiated = match (request.vehicle_class, request.negotiated_fare) {
            (VehicleClass::Auto, Some(offered)) => {
                if offered < quote.minimum_fare_auto {
                    return Err(ApiError::FareTooLow {
                        minimum: quote.minimum_fare_auto,
                    });
                }
                Some(offered)
            }
            (_, Some(_)) => return Err(ApiError::NegotiationNotAllowed),
            (_, None) => None,
        };
        let final_fare = negotiated.unwrap_or(base_fare);

        let otp = generate_ride_otp();

        let mut tx = self.db_pool.begin().await?;

        let ride = sqlx::query_as::<_, Ride>(
            r#"
            INSERT INTO rides (
                id, rider_id, pickup, destination, vehicle_class,
                fare_base, fare_negotiated, fare_final,
                distance_km, duration_minutes, status, otp,
                payment_status, payment_method
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, 'pending', 'wallet')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rider_id)
        .bind(&request.pickup)
        .bind(&request.destination)
        .bind(request.vehicle_class)
        .bind(base_fare)
        .bind(negotiated)
        .bind(final_fare)
        .bind(quote.distance_km)
        .bind(quote.duration_minutes)
        .bind(&otp)
        .fetch_one(&mut *tx)
        .await?;

        // The rider's accepted starting price opens the audit trail
        sqlx::query(
            r#"
            INSERT INTO negotiation_history (id, ride_id, captain_id, requested_by, amount, status)
            VALUES ($1, $2, NULL, 'rider', $3, 'accepted')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ride.id)
        .bind(final_fare)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride.id, rider_id = %rider_id, "Ride created");

        Ok(ride)
    }

    /// Get a single ride by ID
    pub async fn get_ride(&self, ride_id: Uuid) -> ApiResult<Ride> {
        sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = $1")
            .bind(ride_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Ride not found".to_string()))
    }

    /// Submit a captain's counter-offer on a ride's fare
    pub async fn request_price_adjustment(
        &self,
        ride_id: Uuid,
        captain_id: Uuid,
        requested_amount: i64,
    ) -> ApiResult<Ride> {
        if requested_amount <= 0 {
            return Err(ApiError::Validation(
                "Requested amount must be greater than 0".to_string(),
            ));
        }

        let mut tx = self.db_pool.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE rides
            SET status = 'price_negotiation', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'price_negotiation')
            "#,
        )
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Err(self.ride_gate_failure(ride_id, "open for negotiation").await);
        }

        // Partial unique index rejects a second pending offer by this captain
        sqlx::query(
            r#"
            INSERT INTO negotiations (id, ride_id, captain_id, requested_amount, status)
            VALUES ($1, $2, $3, $4, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(captain_id)
        .bind(requested_amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error().and_then(|d| d.constraint()) {
            Some(PENDING_NEGOTIATION_IDX) => ApiError::DuplicateNegotiation,
            _ => ApiError::from(e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO negotiation_history (id, ride_id, captain_id, requested_by, amount, status)
            VALUES ($1, $2, $3, 'captain', $4, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(captain_id)
        .bind(requested_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            ride_id = %ride_id,
            captain_id = %captain_id,
            amount = requested_amount,
            "Price adjustment requested"
        );

        self.get_ride(ride_id).await
    }

    /// Pending offers sorted by price ascending, then captain rating and
    /// experience descending
    pub async fn sorted_negotiations(&self, ride_id: Uuid) -> ApiResult<Vec<SortedNegotiation>> {
        // Surface a missing ride distinctly from an empty offer list
        self.get_ride(ride_id).await?;

        let negotiations = sqlx::query_as::<_, SortedNegotiation>(
            r#"
            SELECT
                n.captain_id,
                c.name AS captain_name,
                n.requested_amount,
                COALESCE(c.rating, 0) AS rating,
                COALESCE(c.experience_years, 0) AS experience_years,
                n.created_at
            FROM negotiations n
            LEFT JOIN captains c ON c.id = n.captain_id
            WHERE n.ride_id = $1 AND n.status = 'pending'
            ORDER BY
                n.requested_amount ASC,
                COALESCE(c.rating, 0) DESC,
                COALESCE(c.experience_years, 0) DESC
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(negotiations)
    }

    /// Full audit trail of every amount ever proposed on a ride, oldest first
    pub async fn negotiation_history(
        &self,
        ride_id: Uuid,
    ) -> ApiResult<Vec<NegotiationHistoryEntry>> {
        self.get_ride(ride_id).await?;

        let history = sqlx::query_as::<_, NegotiationHistoryEntry>(
            r#"
            SELECT * FROM negotiation_history
            WHERE ride_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(history)
    }

    /// Accept one captain's offer, rejecting all others
    ///
    /// Mutually exclusive with `reject_all_negotiations`: both gate on the
    /// ride still being in `price_negotiation`, so exactly one wins a race.
    pub async fn accept_captain_request(
        &self,
        ride_id: Uuid,
        rider_id: Uuid,
        captain_id: Uuid,
    ) -> ApiResult<Ride> {
        let mut tx = self.db_pool.begin().await?;

        let accepted_amount = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE rides r
            SET status = 'matched',
                captain_id = n.captain_id,
                fare_final = n.requested_amount,
                updated_at = NOW()
            FROM negotiations n
            WHERE r.id = $1
              AND r.rider_id = $2
              AND r.status = 'price_negotiation'
              AND n.ride_id = r.id
              AND n.captain_id = $3
              AND n.status = 'pending'
            RETURNING n.requested_amount
            "#,
        )
        .bind(ride_id)
        .bind(rider_id)
        .bind(captain_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(accepted_amount) = accepted_amount else {
            return Err(self
                .negotiation_gate_failure(ride_id, rider_id, captain_id)
                .await);
        };

        sqlx::query(
            r#"
            UPDATE negotiations
            SET status = CASE WHEN captain_id = $2 THEN 'accepted'::negotiation_status
                              ELSE 'rejected'::negotiation_status END
            WHERE ride_id = $1 AND status = 'pending'
            "#,
        )
        .bind(ride_id)
        .bind(captain_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO negotiation_history (id, ride_id, captain_id, requested_by, amount, status)
            VALUES ($1, $2, $3, 'rider', $4, 'accepted')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(captain_id)
        .bind(accepted_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            ride_id = %ride_id,
            captain_id = %captain_id,
            fare = accepted_amount,
            "Captain offer accepted"
        );

        self.get_ride(ride_id).await
    }

    /// Reject every pending offer and reset the ride to `pending` at base fare
    pub async fn reject_all_negotiations(&self, ride_id: Uuid, rider_id: Uuid) -> ApiResult<Ride> {
        let mut tx = self.db_pool.begin().await?;

        let base_fare = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE rides
            SET status = 'pending',
                fare_final = fare_base,
                captain_id = NULL,
                updated_at = NOW()
            WHERE id = $1 AND rider_id = $2 AND status = 'price_negotiation'
            RETURNING fare_base
            "#,
        )
        .bind(ride_id)
        .bind(rider_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(base_fare) = base_fare else {
            return Err(self.owned_gate_failure(ride_id, rider_id, "price_negotiation").await);
        };

        sqlx::query(
            "UPDATE negotiations SET status = 'rejected' WHERE ride_id = $1 AND status = 'pending'",
        )
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO negotiation_history (id, ride_id, captain_id, requested_by, amount, status)
            VALUES ($1, $2, NULL, 'rider', $3, 'rejected')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(base_fare)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride_id, "All negotiations rejected, ride reset");

        self.get_ride(ride_id).await
    }

    /// Captain confirms the ride: direct pickup from `pending`, or the
    /// assigned captain following an accepted negotiation from `matched`
    pub async fn confirm_ride(&self, ride_id: Uuid, captain_id: Uuid) -> ApiResult<Ride> {
        let confirmed = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'accepted',
                captain_id = COALESCE(captain_id, $2),
                updated_at = NOW()
            WHERE id = $1
              AND ((status = 'pending' AND captain_id IS NULL)
                   OR (status = 'matched' AND captain_id = $2))
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(captain_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match confirmed {
            Some(ride) => {
                tracing::info!(ride_id = %ride_id, captain_id = %captain_id, "Ride confirmed");
                Ok(ride)
            }
            None => {
                let ride = self.get_ride(ride_id).await?;
                if ride.status == RideStatus::Matched && ride.captain_id != Some(captain_id) {
                    Err(ApiError::NotAuthorized(
                        "Another captain is assigned to this ride".to_string(),
                    ))
                } else {
                    Err(ApiError::StateConflict(format!(
                        "Ride cannot be confirmed from its current state ({})",
                        status_label(ride.status)
                    )))
                }
            }
        }
    }

    /// Start the trip after OTP verification
    pub async fn start_ride(&self, ride_id: Uuid, captain_id: Uuid, otp: &str) -> ApiResult<Ride> {
        let ride = self.get_ride(ride_id).await?;

        if ride.captain_id != Some(captain_id) {
            return Err(ApiError::NotAuthorized(
                "You are not the captain assigned to this ride".to_string(),
            ));
        }
        if ride.status != RideStatus::Accepted {
            return Err(ApiError::StateConflict(format!(
                "Ride cannot start from its current state ({})",
                status_label(ride.status)
            )));
        }
        if ride.otp != otp {
            return Err(ApiError::InvalidOtp);
        }

        let started = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'in_progress', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND captain_id = $2 AND status = 'accepted'
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(captain_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::StateConflict("Ride is no longer in the accepted state".to_string())
        })?;

        tracing::info!(ride_id = %ride_id, "Ride started");

        Ok(started)
    }

    /// Complete the trip; the held fare becomes releasable to the captain
    pub async fn end_ride(&self, ride_id: Uuid, captain_id: Uuid) -> ApiResult<Ride> {
        let ended = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'completed', ended_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND captain_id = $2 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(captain_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match ended {
            Some(ride) => {
                tracing::info!(ride_id = %ride_id, fare = ride.fare_final, "Ride completed");
                Ok(ride)
            }
            None => {
                let ride = self.get_ride(ride_id).await?;
                if ride.captain_id != Some(captain_id) {
                    Err(ApiError::NotAuthorized(
                        "You are not the captain assigned to this ride".to_string(),
                    ))
                } else {
                    Err(ApiError::StateConflict(format!(
                        "Ride cannot end from its current state ({})",
                        status_label(ride.status)
                    )))
                }
            }
        }
    }

    /// Cancel a ride: terminal status, never deletion
    pub async fn cancel_ride(&self, ride_id: Uuid, rider_id: Uuid) -> ApiResult<Ride> {
        let cancelled = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND rider_id = $2 AND status NOT IN ('completed', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(rider_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match cancelled {
            Some(ride) => {
                tracing::info!(ride_id = %ride_id, "Ride cancelled");
                Ok(ride)
            }
            None => Err(self.owned_gate_failure(ride_id, rider_id, "cancellable").await),
        }
    }

    // ===== Failure classification =====
    //
    // A guarded UPDATE that hits zero rows only says "something didn't
    // match"; these helpers re-read the row to report the exact kind.

    async fn ride_gate_failure(&self, ride_id: Uuid, wanted: &str) -> ApiError {
        match self.get_ride(ride_id).await {
            Ok(ride) => ApiError::StateConflict(format!(
                "Ride is not {} (current state: {})",
                wanted,
                status_label(ride.status)
            )),
            Err(e) => e,
        }
    }

    async fn owned_gate_failure(&self, ride_id: Uuid, rider_id: Uuid, wanted: &str) -> ApiError {
        match self.get_ride(ride_id).await {
            Ok(ride) if ride.rider_id != rider_id => {
                ApiError::NotAuthorized("This ride belongs to another rider".to_string())
            }
            Ok(ride) => ApiError::StateConflict(format!(
                "Ride is not {} (current state: {})",
                wanted,
                status_label(ride.status)
            )),
            Err(e) => e,
        }
    }

    async fn negotiation_gate_failure(
        &self,
        ride_id: Uuid,
        rider_id: Uuid,
        captain_id: Uuid,
    ) -> ApiError {
        let ride = match self.get_ride(ride_id).await {
            Ok(ride) => ride,
            Err(e) => return e,
        };

        if ride.rider_id != rider_id {
            return ApiError::NotAuthorized("This ride belongs to another rider".to_string());
        }
        if ride.status != RideStatus::PriceNegotiation {
            return ApiError::StateConflict(format!(
                "Ride is no longer in price negotiation (current state: {})",
                status_label(ride.status)
            ));
        }

        let pending = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM negotiations
            WHERE ride_id = $1 AND captain_id = $2 AND status = 'pending'
            "#,
        )
        .bind(ride_id)
        .bind(captain_id)
        .fetch_one(&self.db_pool)
        .await;

        match pending {
            Ok(0) => ApiError::NegotiationNotFound,
            Ok(_) => ApiError::StateConflict(
                "Negotiation could not be accepted in the current state".to_string(),
            ),
            Err(e) => ApiError::from(e),
        }
    }
}

fn status_label(status: RideStatus) -> &'static str {
    match status {
        RideStatus::Pending => "pending",
        RideStatus::PriceNegotiation => "price_negotiation",
        RideStatus::Matched => "matched",
        RideStatus::Accepted => "accepted",
        RideStatus::InProgress => "in_progress",
        RideStatus::Completed => "completed",
        RideStatus::Cancelled => "cancelled",
    }
}

/// Six-digit numeric OTP generated at ride creation
fn generate_ride_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_ride_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(RideStatus::PriceNegotiation), "price_negotiation");
        assert_eq!(status_label(RideStatus::Matched), "matched");
        assert_eq!(status_label(RideStatus::InProgress), "in_progress");
    }
}
