//! Round-based multimodal journey search over a static public transit network.
//!
//! The crate consumes an already-validated transit graph (stops, routes,
//! trips, transfers), a shared-bike network with a station distance matrix,
//! and a live delay overlay, and answers earliest-arrival / latest-departure
//! connection queries subject to per-query user settings.

pub mod error;
pub mod model;
pub mod planner;
pub mod prelude;
pub mod routing;
pub mod settings;

pub use error::Error;
pub use planner::{ConnectionRequest, Endpoint, JourneyPlanner};
pub use routing::journey::{Journey, Leg};
pub use settings::Settings;

/// Maximum number of transit trips in a single journey, and thus the number
/// of search rounds after initialization.
pub const ROUNDS: usize = 5;

/// Maximum number of days between the query time and the opposite end of the
/// journey. Reach times beyond this bound never improve a stop.
pub const MAX_TRIP_LENGTH_DAYS: i64 = 1;

/// Index of a stop in the transit arena.
pub type StopId = usize;
/// Index of a route in the transit arena.
pub type RouteId = usize;
/// Index of a trip in the transit arena.
pub type TripId = usize;
/// Index of a bike station in the bike network arena.
pub type BikeStationId = usize;
/// Index of a per-query custom route point.
pub type CustomPointId = usize;
