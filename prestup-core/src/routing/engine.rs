//! The round-based connection search.
//!
//! Each round alternates a trip-scan phase over routes touched by stops
//! improved in the previous round with a relaxation phase over walking
//! transfers and, when shared bikes are enabled, bike trips. A route is
//! scanned at most once per round regardless of how many of its stops were
//! improved; while scanning, the engine upgrades to a better boardable trip
//! whenever the previous round's reach at the current stop allows one.
//!
//! The same code runs forward (earliest arrival) and backward (latest
//! departure): every time and index comparison goes through
//! [`TimeComparator`], and the `from` side of every recorded reach points
//! towards the search origin.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use fixedbitset::FixedBitSet;
use hashbrown::{HashMap, HashSet};
use itertools::Either;
use log::{debug, trace};

use crate::error::Error;
use crate::model::delay::DelayTable;
use crate::model::{BikeNetwork, CustomPoint, PointId, TransitNetwork};
use crate::routing::direction::TimeComparator;
use crate::routing::extract::Extraction;
use crate::routing::journey::Journey;
use crate::routing::state::{Reach, SearchState};
use crate::settings::Settings;
use crate::{BikeStationId, ROUNDS, RouteId, StopId, TripId};

/// Longest billed duration of a single bike leg when the 15-minute cap is
/// enabled.
const BIKE_TRIP_CAP_SECONDS: u32 = 15 * 60;

/// One side of a connection query, resolved to network entities. For a
/// coordinate endpoint the stops and stations near it are listed alongside
/// the custom point itself.
#[derive(Debug, Clone, Default)]
pub struct EndpointPoints {
    pub stops: Vec<StopId>,
    pub stations: Vec<BikeStationId>,
    pub custom: Option<CustomPoint>,
}

/// A fully resolved single connection search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub sources: EndpointPoints,
    pub destinations: EndpointPoints,
    /// Earliest departure of a forward search, latest arrival of a
    /// backward one.
    pub time: NaiveDateTime,
    pub forward: bool,
    pub settings: Settings,
}

/// Runs one search and extracts the best journey, or `None` when no
/// destination point was ever reached.
pub fn search_connection(
    transit: &TransitNetwork,
    bikes: &BikeNetwork,
    delays: &DelayTable,
    request: &SearchRequest,
) -> Result<Option<Journey>, Error> {
    Engine::new(transit, bikes, delays, request).run()
}

/// The trip a marked route will be traversed with, and where it is entered.
struct ReachedTrip {
    trip: TripId,
    date: NaiveDate,
    board_stop: StopId,
    board_index: usize,
}

struct Engine<'a> {
    transit: &'a TransitNetwork,
    bikes: &'a BikeNetwork,
    delays: &'a DelayTable,
    settings: Settings,
    comparator: TimeComparator,
    state: SearchState,
    begin: &'a EndpointPoints,
    end: &'a EndpointPoints,
    marked_stops: FixedBitSet,
    marked_stations: FixedBitSet,
    /// Points next to a custom end point. They must be reached by trip or
    /// bike so that the final walk to the coordinates is the only foot leg;
    /// improving them by transfer would chain two walks.
    end_guard: Option<HashSet<PointId>>,
    round: usize,
}

impl<'a> Engine<'a> {
    fn new(
        transit: &'a TransitNetwork,
        bikes: &'a BikeNetwork,
        delays: &'a DelayTable,
        request: &'a SearchRequest,
    ) -> Self {
        let comparator = TimeComparator::new(request.forward);
        let (begin, end) = if request.forward {
            (&request.sources, &request.destinations)
        } else {
            (&request.destinations, &request.sources)
        };
        let end_points = end
            .stops
            .iter()
            .map(|&stop| PointId::Stop(stop))
            .chain(end.stations.iter().map(|&station| PointId::Bike(station)))
            .collect();
        let end_custom_distances = end.custom.as_ref().map(|custom| custom.distances.clone());
        let end_guard = end
            .custom
            .as_ref()
            .map(|custom| custom.distances.keys().copied().collect());
        let state = SearchState::new(
            comparator,
            request.settings,
            request.time,
            end_points,
            end_custom_distances,
        );
        Engine {
            transit,
            bikes,
            delays,
            settings: request.settings,
            comparator,
            state,
            begin,
            end,
            marked_stops: FixedBitSet::with_capacity(transit.stops.len()),
            marked_stations: FixedBitSet::with_capacity(bikes.stations.len()),
            end_guard,
            round: 0,
        }
    }

    fn run(mut self) -> Result<Option<Journey>, Error> {
        if !self.has_usable_endpoints() {
            return Ok(None);
        }
        self.initiate();
        for round in 1..=ROUNDS {
            self.round = round;
            let routes = self.accumulate_routes();
            trace!("round {round}: scanning {} routes", routes.len());
            self.traverse_routes(routes)?;
            if self.settings.use_shared_bikes {
                self.traverse_bike_trips();
            }
            self.relax_transfers(false);
            if self.marked_stops.is_clear() && self.marked_stations.is_clear() {
                debug!("search settled after round {round}");
                break;
            }
        }
        let extraction = Extraction {
            transit: self.transit,
            bikes: self.bikes,
            delays: self.delays,
            settings: self.settings,
            comparator: self.comparator,
            state: &self.state,
            end_stops: &self.end.stops,
            end_custom: self.end.custom.as_ref(),
            begin_custom: self.begin.custom.as_ref(),
        };
        extraction.best_journey()
    }

    fn has_usable_endpoints(&self) -> bool {
        let usable = |points: &EndpointPoints| {
            if let Some(custom) = &points.custom {
                !custom.transfers.is_empty()
            } else if self.settings.use_shared_bikes {
                !points.stops.is_empty() || !points.stations.is_empty()
            } else {
                !points.stops.is_empty()
            }
        };
        usable(self.begin) && usable(self.end)
    }

    /// Round 0: seed the begin points and walk their immediate transfers.
    fn initiate(&mut self) {
        let begin = self.begin;
        if let Some(custom) = &begin.custom {
            let begin_time = self.state.begin_time();
            for transfer in &custom.transfers {
                if transfer.distance > self.settings.max_transfer_distance() {
                    continue;
                }
                let walk = self.settings.adjusted_walking_transfer_time(transfer.distance);
                let reach = self.comparator.offset(begin_time, i64::from(walk));
                let entry = Reach::CustomTransfer {
                    distance: transfer.distance,
                };
                match transfer.point {
                    PointId::Stop(stop) => {
                        if self.state.try_improve(transfer.point, reach, 0, entry) {
                            self.marked_stops.set(stop, true);
                        }
                    }
                    PointId::Bike(station) if self.settings.use_shared_bikes => {
                        if self.state.try_improve(transfer.point, reach, 0, entry) {
                            self.marked_stations.set(station, true);
                        }
                    }
                    _ => {}
                }
            }
        } else {
            for &stop in &begin.stops {
                self.state.set_search_start(PointId::Stop(stop));
                self.marked_stops.set(stop, true);
            }
            if self.settings.use_shared_bikes {
                for &station in &begin.stations {
                    self.state.set_search_start(PointId::Bike(station));
                    self.marked_stations.set(station, true);
                }
            }
            // in round 0 only the begin stops relax their transfers
            self.relax_transfers(true);
        }
    }

    /// Collects every route passing through a stop marked in the previous
    /// round, together with the first boardable trip at the marked stop
    /// closest to the route's start in scan order. Consumes the marks.
    fn accumulate_routes(&mut self) -> HashMap<RouteId, ReachedTrip> {
        let transit = self.transit;
        let marked: Vec<StopId> = self.marked_stops.ones().collect();
        self.marked_stops.clear();

        let mut reached: HashMap<RouteId, ReachedTrip> = HashMap::new();
        for stop in marked {
            for &route_id in &transit.stops[stop].routes {
                let route = &transit.routes[route_id];
                let index = if self.comparator.is_forward() {
                    route.first_stop_index(stop)
                } else {
                    route.last_stop_index(stop)
                };
                let Some(index) = index else { continue };
                if let Some(existing) = reached.get(&route_id) {
                    if !self.comparator.index_improves(index, existing.board_index) {
                        continue;
                    }
                }
                if let Some(trip) = self.find_boardable_trip(route_id, stop, index) {
                    reached.insert(route_id, trip);
                }
            }
        }
        reached
    }

    fn find_boardable_trip(&self, route_id: RouteId, stop: StopId, index: usize) -> Option<ReachedTrip> {
        let point = PointId::Stop(stop);
        let mut reach = self.state.round_time(point, self.round - 1);
        if reach == self.comparator.worst() {
            return None;
        }
        // arriving on board requires the stationary interchange minimum
        // before boarding again; round 1 starts from the query time itself
        if self.round > 1 && self.state.reached_by_trip(point, self.round - 1) {
            let minimum = self.settings.stationary_transfer_minimum();
            reach = self.comparator.offset(reach, i64::from(minimum));
        }
        let route = &self.transit.routes[route_id];
        let (trip, date) =
            route.transferable_trip(self.comparator.is_forward(), &self.transit.trips, self.delays, index, reach)?;
        Some(ReachedTrip {
            trip,
            date,
            board_stop: stop,
            board_index: index,
        })
    }

    fn traverse_routes(&mut self, routes: HashMap<RouteId, ReachedTrip>) -> Result<(), Error> {
        for (route_id, reached) in routes {
            self.traverse_route(route_id, reached)?;
        }
        Ok(())
    }

    /// Rides the reached trip along the route in scan order, improving every
    /// stop whose round-r reach it beats, and upgrading to a better trip
    /// when the previous round's reach at the current stop allows one.
    fn traverse_route(&mut self, route_id: RouteId, reached: ReachedTrip) -> Result<(), Error> {
        let transit = self.transit;
        let route = &transit.routes[route_id];
        let ReachedTrip {
            mut trip,
            mut date,
            mut board_stop,
            mut board_index,
        } = reached;

        let indices = if self.comparator.is_forward() {
            Either::Left(board_index..route.stops.len())
        } else {
            Either::Right((0..=board_index).rev())
        };
        for i in indices {
            let stop = route.stops[i];
            let stop_time = transit
                .trips
                .get(trip)
                .and_then(|t| t.stop_times.get(i))
                .copied()
                .ok_or_else(|| {
                    Error::InternalData(format!(
                        "trip {trip} on route {} has no stop time at index {i}",
                        route.id
                    ))
                })?;
            let (arrival_delay, departure_delay) = self
                .delays
                .stop_delay(date, &transit.trips[trip].id, i)
                .unwrap_or((0, 0));
            let arrival = stop_time.arrival_at(date) + TimeDelta::seconds(i64::from(arrival_delay));
            let departure = stop_time.departure_at(date) + TimeDelta::seconds(i64::from(departure_delay));
            let (reach_time, leave_time) = if self.comparator.is_forward() {
                (arrival, departure)
            } else {
                (departure, arrival)
            };

            let improved = self.state.try_improve(
                PointId::Stop(stop),
                reach_time,
                self.round,
                Reach::Trip {
                    trip,
                    trip_date: date,
                    from: board_stop,
                    from_index: board_index,
                },
            );
            if improved {
                self.marked_stops.set(stop, true);
            }

            // trip upgrading: the previous round may have reached this stop
            // early enough to catch a better trip than the one we ride
            let point = PointId::Stop(stop);
            let mut last_round_reach = self.state.round_time(point, self.round - 1);
            if !self.comparator.improves(last_round_reach, leave_time) {
                continue;
            }
            if self.round > 1 && self.state.reached_by_trip(point, self.round - 1) {
                let minimum = self.settings.stationary_transfer_minimum();
                last_round_reach = self.comparator.offset(last_round_reach, i64::from(minimum));
            }
            if !self.comparator.improves_or_equals(last_round_reach, leave_time) {
                continue;
            }
            if let Some((new_trip, new_date)) = route.transferable_trip(
                self.comparator.is_forward(),
                &transit.trips,
                self.delays,
                i,
                last_round_reach,
            ) {
                let better_entry = self
                    .comparator
                    .improves(self.state.best_reach(point), self.state.best_reach(PointId::Stop(board_stop)));
                if new_trip != trip || better_entry {
                    trip = new_trip;
                    date = new_date;
                    board_stop = stop;
                    board_index = i;
                }
            }
        }
        Ok(())
    }

    /// Rides shared bikes from every station marked in the previous round to
    /// all stations with a known distance. Consumes the station marks.
    fn traverse_bike_trips(&mut self) {
        let bikes = self.bikes;
        let marked: Vec<BikeStationId> = self.marked_stations.ones().collect();
        self.marked_stations.clear();

        for station in marked {
            let from = PointId::Bike(station);
            // a forward rider picks the bike up here
            if self.comparator.is_forward() && !bikes.stations[station].has_bikes() {
                continue;
            }
            // two bike trips in a row never help: riding on is always better
            if self.state.reached_by_bike_trip(from, self.round - 1) {
                continue;
            }
            let from_time = self.state.round_time(from, self.round - 1);
            if from_time == self.comparator.worst() {
                continue;
            }
            for (other, distance) in bikes.distances_from(station) {
                if self.settings.bike_max_15_minutes
                    && self.settings.bike_trip_time(distance) > BIKE_TRIP_CAP_SECONDS
                {
                    continue;
                }
                // a backward rider picks the bike up at the other end
                if !self.comparator.is_forward() && !bikes.stations[other].has_bikes() {
                    continue;
                }
                let duration = self.settings.full_bike_trip_time(distance);
                let reach = self.comparator.offset(from_time, i64::from(duration));
                let entry = Reach::BikeTrip {
                    from: station,
                    distance,
                };
                if self.state.try_improve(PointId::Bike(other), reach, self.round, entry) {
                    self.marked_stations.set(other, true);
                }
            }
        }
    }

    /// Walks every outgoing transfer of the points improved this round.
    /// Points already reached by a transfer in this round do not relay on:
    /// two walks in a row collapse into one longer walk, which either exists
    /// as its own transfer or is not allowed at all.
    fn relax_transfers(&mut self, only_from_stops: bool) {
        let transit = self.transit;
        let bikes = self.bikes;
        let use_bikes = self.settings.use_shared_bikes;
        let mut new_stops = FixedBitSet::with_capacity(transit.stops.len());
        let mut new_stations = FixedBitSet::with_capacity(bikes.stations.len());

        for stop in self.marked_stops.ones().collect::<Vec<_>>() {
            let from = PointId::Stop(stop);
            if self.state.reached_by_transfer(from, self.round) {
                continue;
            }
            let from_time = self.state.round_time(from, self.round);
            if from_time == self.comparator.worst() {
                continue;
            }
            for transfer in &transit.stops[stop].transfers {
                self.try_relax(
                    from,
                    from_time,
                    PointId::Stop(transfer.to),
                    transfer.distance,
                    &mut new_stops,
                    &mut new_stations,
                );
            }
            if use_bikes {
                for link in &transit.stops[stop].bike_links {
                    self.try_relax(
                        from,
                        from_time,
                        PointId::Bike(link.station),
                        link.distance,
                        &mut new_stops,
                        &mut new_stations,
                    );
                }
            }
        }

        if use_bikes && !only_from_stops {
            for station in self.marked_stations.ones().collect::<Vec<_>>() {
                let from = PointId::Bike(station);
                if self.state.reached_by_transfer(from, self.round) {
                    continue;
                }
                let from_time = self.state.round_time(from, self.round);
                if from_time == self.comparator.worst() {
                    continue;
                }
                for link in &bikes.stations[station].stop_links {
                    self.try_relax(
                        from,
                        from_time,
                        PointId::Stop(link.stop),
                        link.distance,
                        &mut new_stops,
                        &mut new_stations,
                    );
                }
            }
        }

        self.marked_stops.union_with(&new_stops);
        self.marked_stations.union_with(&new_stations);
    }

    fn try_relax(
        &mut self,
        from: PointId,
        from_time: NaiveDateTime,
        to: PointId,
        distance: u32,
        new_stops: &mut FixedBitSet,
        new_stations: &mut FixedBitSet,
    ) {
        if distance > self.settings.max_transfer_distance() && !self.same_node(from, to) {
            return;
        }
        if let Some(guard) = &self.end_guard {
            if guard.contains(&to) {
                return;
            }
        }
        let to_bike = matches!(to, PointId::Bike(_));
        let duration = self.settings.transfer_duration(distance, to_bike);
        let reach = self.comparator.offset(from_time, i64::from(duration));
        let entry = match (from, to) {
            (PointId::Stop(from_stop), PointId::Stop(_)) => Reach::Transfer {
                from: from_stop,
                distance,
            },
            _ => Reach::BikeTransfer { from, distance },
        };
        if self.state.try_improve(to, reach, self.round, entry) {
            match to {
                PointId::Stop(stop) => new_stops.set(stop, true),
                PointId::Bike(station) => new_stations.set(station, true),
                PointId::Custom(_) => {}
            }
        }
    }

    /// Transfers inside a node are exempt from the distance cap.
    fn same_node(&self, a: PointId, b: PointId) -> bool {
        match (a, b) {
            (PointId::Stop(x), PointId::Stop(y)) => self.transit.stops[x].name == self.transit.stops[y].name,
            _ => false,
        }
    }
}
