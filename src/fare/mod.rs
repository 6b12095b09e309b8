//! Fare calculation
//!
//! Pure quoting over the configured rate table and a routing lookup result.
//! Nothing here touches storage; the ride service persists what it quotes.

use serde::{Deserialize, Serialize};

use crate::config::FareConfig;
use crate::error::{ApiError, ApiResult};
use crate::routing::{DistanceTime, RouteLookup, RoutingError};

/// Supported vehicle classes
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Auto,
    Car,
    Moto,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Auto => "auto",
            VehicleClass::Car => "car",
            VehicleClass::Moto => "moto",
        }
    }
}

/// Base fares per vehicle class
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BaseFares {
    pub auto: i64,
    pub car: i64,
    pub moto: i64,
}

impl BaseFares {
    pub fn for_class(&self, class: VehicleClass) -> i64 {
        match class {
            VehicleClass::Auto => self.auto,
            VehicleClass::Car => self.car,
            VehicleClass::Moto => self.moto,
        }
    }
}

/// A computed fare quote for one trip
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct FareQuote {
    pub base_fares: BaseFares,
    /// Lowest negotiable fare for the auto class
    pub minimum_fare_auto: i64,
    pub distance_km: f64,
    pub duration_minutes: f64,
}

fn class_fare(rates: &crate::config::ClassRates, km: f64, minutes: f64) -> i64 {
    (rates.base + rates.per_km * km + rates.per_minute * minutes).round() as i64
}

/// Compute a quote from a routing result
///
/// Rejects trips beyond the configured distance/duration ceilings before
/// any fare math happens, so pathological routes never price.
pub fn quote(config: &FareConfig, dt: DistanceTime) -> ApiResult<FareQuote> {
    let km = dt.distance_m / 1000.0;
    let minutes = dt.duration_s / 60.0;

    if km > config.max_distance_km {
        return Err(ApiError::LimitExceeded(format!(
            "Distance exceeds maximum allowed limit of {} km",
            config.max_distance_km
        )));
    }

    if minutes > config.max_duration_minutes {
        return Err(ApiError::LimitExceeded(format!(
            "Duration exceeds maximum allowed limit of {} minutes",
            config.max_duration_minutes
        )));
    }

    let base_fares = BaseFares {
        auto: class_fare(&config.auto, km, minutes),
        car: class_fare(&config.car, km, minutes),
        moto: class_fare(&config.moto, km, minutes),
    };

    Ok(FareQuote {
        base_fares,
        minimum_fare_auto: base_fares.auto + config.auto_negotiation_floor,
        distance_km: km,
        duration_minutes: minutes,
    })
}

/// Quote a trip between two location descriptors
pub async fn calculate_ride_fare(
    config: &FareConfig,
    routing: &dyn RouteLookup,
    pickup: &str,
    destination: &str,
) -> ApiResult<FareQuote> {
    if pickup.trim().is_empty() || destination.trim().is_empty() {
        return Err(ApiError::Validation(
            "Pickup and destination locations are required".to_string(),
        ));
    }

    let dt = routing
        .distance_time(pickup, destination)
        .await
        .map_err(|e| match e {
            RoutingError::NoRoute => ApiError::RouteNotFound,
            RoutingError::Throttled => ApiError::RateLimited,
            RoutingError::Unavailable(msg) => ApiError::ExternalService(msg),
        })?;

    quote(config, dt)
}
