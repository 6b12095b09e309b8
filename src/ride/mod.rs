//! Ride lifecycle domain module

mod model;
mod service;

pub use model::{
    CreateRideRequest, NegotiationHistoryEntry, NegotiationStatus, PaymentMethod, PaymentStatus,
    RequestedBy, Ride, RideEvent, RideStatus, SortedNegotiation,
};
pub use service::RideService;
