//! Ride models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::fare::VehicleClass;

/// Ride lifecycle states
///
/// `Matched` is the explicit "offer accepted, awaiting captain confirmation"
/// state; `Accepted` unambiguously means the captain has confirmed and the
/// trip has not started.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "ride_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    PriceNegotiation,
    Matched,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

/// Payment settlement status of a ride
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// How the ride is paid
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Gateway,
    Cash,
}

/// Ride record
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub captain_id: Option<Uuid>,
    pub pickup: String,
    pub destination: String,
    pub vehicle_class: VehicleClass,
    /// Quoted fare for the chosen class
    pub fare_base: i64,
    /// Rider-proposed starting price (auto class only)
    pub fare_negotiated: Option<i64>,
    /// Authoritative amount charged
    pub fare_final: i64,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub status: RideStatus,
    #[serde(skip_serializing)]
    pub otp: String,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of one captain's offer
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "negotiation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A pending offer joined with captain standing, in rider-facing sort order
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct SortedNegotiation {
    pub captain_id: Uuid,
    pub captain_name: Option<String>,
    pub requested_amount: i64,
    pub rating: f64,
    pub experience_years: i32,
    pub created_at: DateTime<Utc>,
}

/// Which party proposed an amount
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "requested_by", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestedBy {
    Rider,
    Captain,
}

/// Append-only audit entry covering every offer ever made on a ride
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct NegotiationHistoryEntry {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub captain_id: Option<Uuid>,
    pub requested_by: RequestedBy,
    pub amount: i64,
    pub status: NegotiationStatus,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a ride
#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub pickup: String,
    pub destination: String,
    pub vehicle_class: VehicleClass,
    pub negotiated_fare: Option<i64>,
}

impl CreateRideRequest {
    /// Validate request shape; fare policy checks happen in the service
    pub fn validate(&self) -> Result<(), String> {
        if self.pickup.trim().is_empty() {
            return Err("Pickup location is required".to_string());
        }
        if self.destination.trim().is_empty() {
            return Err("Destination location is required".to_string());
        }
        if let Some(fare) = self.negotiated_fare {
            if fare <= 0 {
                return Err("Negotiated fare must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}

/// Ride event types for real-time updates
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum RideEvent {
    Created {
        ride_id: Uuid,
        rider_id: Uuid,
        vehicle_class: VehicleClass,
    },
    NegotiationRequested {
        ride_id: Uuid,
        captain_id: Uuid,
        requested_amount: i64,
    },
    StatusChanged {
        ride_id: Uuid,
        status: RideStatus,
    },
    Completed {
        ride_id: Uuid,
        fare_final: i64,
    },
}

impl RideEvent {
    /// Ride this event belongs to, for subscription filtering
    pub fn ride_id(&self) -> Uuid {
        match self {
            RideEvent::Created { ride_id, .. }
            | RideEvent::NegotiationRequested { ride_id, .. }
            | RideEvent::StatusChanged { ride_id, .. }
            | RideEvent::Completed { ride_id, .. } => *ride_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ride_validation() {
        let mut request = CreateRideRequest {
            pickup: "123 Main St".to_string(),
            destination: "456 Oak Ave".to_string(),
            vehicle_class: VehicleClass::Auto,
            negotiated_fare: Some(90),
        };
        assert!(request.validate().is_ok());

        request.pickup = "  ".to_string();
        assert!(request.validate().is_err());

        request.pickup = "123 Main St".to_string();
        request.negotiated_fare = Some(0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(!RideStatus::Pending.is_terminal());
        assert!(!RideStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&RideStatus::PriceNegotiation).unwrap();
        assert_eq!(json, r#""price_negotiation""#);
        let json = serde_json::to_string(&RideStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);
    }

    #[test]
    fn test_event_ride_id() {
        let id = Uuid::new_v4();
        let event = RideEvent::Completed {
            ride_id: id,
            fare_final: 80,
        };
        assert_eq!(event.ride_id(), id);
    }
}
