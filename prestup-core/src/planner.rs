//! Public facade over the network models and the search engine.
//!
//! A [`JourneyPlanner`] owns the immutable networks and the live delay
//! overlay and is shared across concurrent queries. Request validation
//! happens here, before any search state exists; the engine itself only
//! ever sees resolved arena indices.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{BikeNetwork, CustomPoint, DelayOverlay, PointId, TransitNetwork, geometry};
use crate::routing::alternatives::{self, AlternativeTrip};
use crate::routing::engine::{EndpointPoints, SearchRequest, search_connection};
use crate::routing::journey::Journey;
use crate::routing::range::search_connection_range;
use crate::settings::Settings;

/// Longest accepted range-search window.
const MAX_RANGE_WINDOW: TimeDelta = TimeDelta::hours(24);

/// Where a connection search starts or ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    /// All stops of the node sharing this name.
    Node(String),
    /// Explicit stop ids.
    Stops(Vec<String>),
    /// Raw coordinates, served by an ad hoc custom route point.
    Coords { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub source: Endpoint,
    pub destination: Endpoint,
    /// Earliest departure when `by_earliest_departure`, latest arrival
    /// otherwise.
    pub time: NaiveDateTime,
    pub by_earliest_departure: bool,
    pub settings: Settings,
}

pub struct JourneyPlanner {
    transit: Arc<TransitNetwork>,
    bikes: Arc<BikeNetwork>,
    delays: Arc<DelayOverlay>,
}

impl JourneyPlanner {
    pub fn new(transit: Arc<TransitNetwork>, bikes: Arc<BikeNetwork>) -> Self {
        JourneyPlanner {
            transit,
            bikes,
            delays: Arc::new(DelayOverlay::new()),
        }
    }

    /// Entry point for the delay feed client: swap in fresh delay tables
    /// through [`DelayOverlay::replace`].
    pub fn delay_overlay(&self) -> &DelayOverlay {
        &self.delays
    }

    /// Entry point for the bike status feed client: apply availability
    /// snapshots through [`BikeNetwork::apply_station_status`].
    pub fn bike_network(&self) -> &BikeNetwork {
        &self.bikes
    }

    pub fn transit_network(&self) -> &TransitNetwork {
        &self.transit
    }

    /// The best connection for the request, or [`Error::NotFound`] when no
    /// destination point is reachable.
    pub fn find_connection(&self, request: &ConnectionRequest) -> Result<Journey, Error> {
        let search = self.resolve(request)?;
        let delays = self.delays.snapshot();
        debug!(
            "connection search at {} ({})",
            search.time,
            if search.forward { "forward" } else { "backward" }
        );
        match search_connection(&self.transit, &self.bikes, &delays, &search) {
            Ok(Some(journey)) => Ok(journey),
            Ok(None) => Err(Error::NotFound),
            Err(error) => {
                warn!("connection search aborted: {error}");
                Err(error)
            }
        }
    }

    /// All non-dominated connections departing within `window` of the
    /// request time.
    pub fn find_connections_range(
        &self,
        request: &ConnectionRequest,
        window: TimeDelta,
    ) -> Result<Vec<Journey>, Error> {
        if window <= TimeDelta::zero() || window > MAX_RANGE_WINDOW {
            return Err(Error::Validation(format!(
                "range window of {} minutes is outside the accepted bounds",
                window.num_minutes()
            )));
        }
        let search = self.resolve(request)?;
        let delays = self.delays.snapshot();
        search_connection_range(&self.transit, &self.bikes, &delays, &search, window)
    }

    /// Up to `count` direct trips on the same route next to `trip_id`, in
    /// the requested direction, without running a full search.
    pub fn alternative_trips(
        &self,
        route_id: &str,
        trip_id: &str,
        date: NaiveDate,
        later: bool,
        count: usize,
    ) -> Result<Vec<AlternativeTrip>, Error> {
        let route = self
            .transit
            .route_by_id(route_id)
            .ok_or_else(|| Error::Validation(format!("unknown route id {route_id}")))?;
        let trip = self
            .transit
            .trip_by_id(trip_id)
            .ok_or_else(|| Error::Validation(format!("unknown trip id {trip_id}")))?;
        alternatives::alternative_trips(&self.transit, route, trip, date, later, count)
    }

    /// Re-stamps previously computed journeys with the current delay data,
    /// without re-searching.
    pub fn update_delays(&self, journeys: &mut [Journey]) {
        let delays = self.delays.snapshot();
        for journey in journeys {
            journey.restamp_delays(&delays);
        }
    }

    fn resolve(&self, request: &ConnectionRequest) -> Result<SearchRequest, Error> {
        request.settings.validate()?;
        Ok(SearchRequest {
            sources: self.resolve_endpoint(&request.source, &request.settings)?,
            destinations: self.resolve_endpoint(&request.destination, &request.settings)?,
            time: request.time,
            forward: request.by_earliest_departure,
            settings: request.settings,
        })
    }

    fn resolve_endpoint(&self, endpoint: &Endpoint, settings: &Settings) -> Result<EndpointPoints, Error> {
        match endpoint {
            Endpoint::Node(name) => {
                let stops = self.transit.stops_by_name(name);
                if stops.is_empty() {
                    return Err(Error::Validation(format!("unknown stop name {name}")));
                }
                Ok(EndpointPoints {
                    stops,
                    stations: Vec::new(),
                    custom: None,
                })
            }
            Endpoint::Stops(ids) => {
                let stops = ids
                    .iter()
                    .map(|id| {
                        self.transit
                            .stop_by_id(id)
                            .ok_or_else(|| Error::Validation(format!("unknown stop id {id}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if stops.is_empty() {
                    return Err(Error::Validation("no stop ids given".into()));
                }
                Ok(EndpointPoints {
                    stops,
                    stations: Vec::new(),
                    custom: None,
                })
            }
            Endpoint::Coords { lat, lon } => {
                let custom = CustomPoint::near(
                    "requested location",
                    geometry::latlon(*lat, *lon),
                    &self.transit,
                    &self.bikes,
                    settings.max_transfer_distance(),
                    settings.use_shared_bikes,
                );
                if custom.transfers.is_empty() {
                    // nothing in walking range of the coordinates
                    return Err(Error::NotFound);
                }
                let mut stops = Vec::new();
                let mut stations = Vec::new();
                for transfer in &custom.transfers {
                    match transfer.point {
                        PointId::Stop(stop) => stops.push(stop),
                        PointId::Bike(station) => stations.push(station),
                        PointId::Custom(_) => {}
                    }
                }
                Ok(EndpointPoints {
                    stops,
                    stations,
                    custom: Some(custom),
                })
            }
        }
    }
}
