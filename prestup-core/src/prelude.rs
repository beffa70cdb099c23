//! Convenient single import of the crate's public surface.

pub use crate::{BikeStationId, CustomPointId, MAX_TRIP_LENGTH_DAYS, ROUNDS, RouteId, StopId, TripId};

pub use crate::error::Error;
pub use crate::model::{
    BikeNetwork, BikeStation, CustomPoint, DelayOverlay, DelayTable, ForbiddenCrossingLine, PointId,
    Route, StationDistanceMatrix, Stop, StopTime, Transfer, TransitNetwork, Trip, link_bike_stations,
};
pub use crate::planner::{ConnectionRequest, Endpoint, JourneyPlanner};
pub use crate::routing::{
    AlternativeTrip, Journey, Leg, LegPoint, SearchRequest, alternative_trips, search_connection,
    search_connection_range,
};
pub use crate::settings::{BikeTripBuffer, ComfortBalance, Settings, TransferBuffer, WalkingPreference};
