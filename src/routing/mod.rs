//! Routing lookup collaborator
//!
//! The fare engine needs one thing from the maps world: distance and
//! duration between two opaque location descriptors. That capability is a
//! trait injected at process start, so deployments pick the real
//! distance-matrix API or the in-process table without any runtime toggle.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Distance and duration between two locations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceTime {
    /// Distance in meters
    pub distance_m: f64,
    /// Duration in seconds
    pub duration_s: f64,
}

/// Routing collaborator failures
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no route found between the specified locations")]
    NoRoute,

    #[error("routing service query limit exceeded")]
    Throttled,

    #[error("routing service unavailable: {0}")]
    Unavailable(String),
}

/// Distance/time lookup between two location descriptors
#[async_trait]
pub trait RouteLookup: Send + Sync {
    async fn distance_time(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<DistanceTime, RoutingError>;
}

/// Real distance-matrix HTTP API client
pub struct HttpRouteLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

impl HttpRouteLookup {
    /// Create a client with a bounded per-request timeout
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl RouteLookup for HttpRouteLookup {
    async fn distance_time(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<DistanceTime, RoutingError> {
        let url = format!("{}/json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| RoutingError::Unavailable(e.to_string()))?;

        let body: MatrixResponse = response
            .json()
            .await
            .map_err(|e| RoutingError::Unavailable(e.to_string()))?;

        match body.status.as_str() {
            "OK" => {}
            "OVER_QUERY_LIMIT" => return Err(RoutingError::Throttled),
            other => return Err(RoutingError::Unavailable(other.to_string())),
        }

        let element = body
            .rows
            .first()
            .and_then(|r| r.elements.first())
            .ok_or(RoutingError::NoRoute)?;

        if element.status == "ZERO_RESULTS" {
            return Err(RoutingError::NoRoute);
        }

        match (&element.distance, &element.duration) {
            (Some(d), Some(t)) => Ok(DistanceTime {
                distance_m: d.value,
                duration_s: t.value,
            }),
            _ => Err(RoutingError::NoRoute),
        }
    }
}

/// Fixed-table lookup for development and tests
///
/// Unknown pairs fall back to 5 km / 15 minutes so local flows never stall
/// on missing fixture data.
pub struct StaticRouteLookup {
    routes: HashMap<(String, String), DistanceTime>,
    default: DistanceTime,
}

impl StaticRouteLookup {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            default: DistanceTime {
                distance_m: 5000.0,
                duration_s: 900.0,
            },
        }
    }

    /// Register a fixed route
    pub fn with_route(mut self, origin: &str, destination: &str, dt: DistanceTime) -> Self {
        self.routes
            .insert((origin.to_string(), destination.to_string()), dt);
        self
    }
}

impl Default for StaticRouteLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteLookup for StaticRouteLookup {
    async fn distance_time(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<DistanceTime, RoutingError> {
        let key = (origin.to_string(), destination.to_string());
        Ok(*self.routes.get(&key).unwrap_or(&self.default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_default() {
        let lookup = StaticRouteLookup::new();
        let dt = lookup
            .distance_time("123 Main St", "456 Oak Ave")
            .await
            .unwrap();
        assert_eq!(dt.distance_m, 5000.0);
        assert_eq!(dt.duration_s, 900.0);
    }

    #[tokio::test]
    async fn test_static_lookup_registered_route() {
        let lookup = StaticRouteLookup::new().with_route(
            "A",
            "B",
            DistanceTime {
                distance_m: 12000.0,
                duration_s: 1800.0,
            },
        );

        let dt = lookup.distance_time("A", "B").await.unwrap();
        assert_eq!(dt.distance_m, 12000.0);

        // Unknown pair still resolves to the default
        let dt = lookup.distance_time("B", "A").await.unwrap();
        assert_eq!(dt.distance_m, 5000.0);
    }
}
