//! Static transit network arena: stops, routes, trips and walking transfers.
//!
//! The network is built once at startup from the (external) schedule loader
//! and is read-only afterwards, so concurrent queries share it without
//! locking. All cross-references between entities are arena indices.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use geo::Point;
use hashbrown::HashMap;
use log::info;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::error::Error;
use crate::model::delay::DelayTable;
use crate::model::geometry::{
    self, ForbiddenCrossingLine, crossing_forbidden, simplified_distance_between,
    too_far_in_one_direction,
};
use crate::{BikeStationId, RouteId, StopId, TripId};

/// Maximum distance between two stops for a static transfer to be created
/// during network construction.
pub const MAX_TRANSFER_DISTANCE: u32 = 750;

/// How long before a scheduled departure the boardable-trip search stops
/// consulting the delay overlay.
const DELAY_LOOKUP_HORIZON: TimeDelta = TimeDelta::hours(2);

/// A walking transfer between two stops. The opposite-direction transfer is
/// the same id pair walked in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: StopId,
    pub to: StopId,
    /// Straight-line distance in meters. Zero marks a virtual same-stop
    /// interchange.
    pub distance: u32,
}

/// A walking link between a stop and a bike station, usable in either
/// direction depending on which side it is stored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BikeLink {
    pub stop: StopId,
    pub station: BikeStationId,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub geometry: Point<f64>,
    /// Routes passing through this stop, in first-seen order.
    pub routes: Vec<RouteId>,
    /// Outgoing walking transfers.
    pub transfers: Vec<Transfer>,
    /// Outgoing walking links to bike stations.
    pub bike_links: Vec<BikeLink>,
}

impl Stop {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Stop {
            id: id.into(),
            name: name.into(),
            geometry: geometry::latlon(lat, lon),
            routes: Vec::new(),
            transfers: Vec::new(),
            bike_links: Vec::new(),
        }
    }
}

/// Arrival and departure of one trip at one stop, as a time of day plus the
/// number of days since the trip started. The day offsets, not any absolute
/// timestamp, are the source of truth for date arithmetic on trips that
/// cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTime {
    pub arrival: NaiveTime,
    pub departure: NaiveTime,
    pub arrival_day: u8,
    pub departure_day: u8,
}

impl StopTime {
    pub fn new(arrival: NaiveTime, departure: NaiveTime, arrival_day: u8, departure_day: u8) -> Self {
        StopTime {
            arrival,
            departure,
            arrival_day,
            departure_day,
        }
    }

    /// Arrival instant of a trip that started on `trip_date`.
    pub fn arrival_at(&self, trip_date: NaiveDate) -> NaiveDateTime {
        (trip_date + Days::new(u64::from(self.arrival_day))).and_time(self.arrival)
    }

    /// Departure instant of a trip that started on `trip_date`.
    pub fn departure_at(&self, trip_date: NaiveDate) -> NaiveDateTime {
        (trip_date + Days::new(u64::from(self.departure_day))).and_time(self.departure)
    }
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub id: String,
    pub route: RouteId,
    /// One entry per stop of the route's pattern, same indexing.
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    pub fn new(id: impl Into<String>, route: RouteId, stop_times: Vec<StopTime>) -> Self {
        Trip {
            id: id.into(),
            route,
            stop_times,
        }
    }
}

/// A unique stop pattern with the trips serving it, keyed by operating date.
/// One human-facing line typically maps to several routes (shortened trips,
/// depot runs, ...).
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    /// The stop pattern, in travel order.
    pub stops: Vec<StopId>,
    /// Trips operating on each date, ordered by first-stop departure.
    pub trips_by_date: HashMap<NaiveDate, Vec<TripId>>,
}

impl Route {
    pub fn new(
        id: impl Into<String>,
        short_name: impl Into<String>,
        long_name: impl Into<String>,
        stops: Vec<StopId>,
    ) -> Self {
        Route {
            id: id.into(),
            short_name: short_name.into(),
            long_name: long_name.into(),
            stops,
            trips_by_date: HashMap::new(),
        }
    }

    /// First index of `stop` in the pattern, for boarding in the forward
    /// direction.
    pub fn first_stop_index(&self, stop: StopId) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }

    /// Last index of `stop` in the pattern, for alighting in the backward
    /// direction.
    pub fn last_stop_index(&self, stop: StopId) -> Option<usize> {
        self.stops.iter().rposition(|&s| s == stop)
    }

    /// The first trip that can be transferred to (forward: earliest
    /// delay-adjusted departure at or after `reach`) or from (backward:
    /// latest delay-adjusted arrival at or before `reach`) at the pattern
    /// position `stop_index`. Returns the trip and its start date.
    pub fn transferable_trip(
        &self,
        forward: bool,
        trips: &[Trip],
        delays: &DelayTable,
        stop_index: usize,
        reach: NaiveDateTime,
    ) -> Option<(TripId, NaiveDate)> {
        if forward {
            self.earliest_departing_after(trips, delays, stop_index, reach)
        } else {
            self.latest_arriving_before(trips, delays, stop_index, reach)
        }
    }

    fn earliest_departing_after(
        &self,
        trips: &[Trip],
        delays: &DelayTable,
        stop_index: usize,
        reach: NaiveDateTime,
    ) -> Option<(TripId, NaiveDate)> {
        let base = reach.date();
        for date in [base - Days::new(1), base, base + Days::new(1)] {
            let Some(on_date) = self.trips_by_date.get(&date) else {
                continue;
            };
            for &trip_id in on_date {
                let scheduled = trips[trip_id].stop_times[stop_index].departure_at(date);
                let departure = if scheduled + DELAY_LOOKUP_HORIZON < reach {
                    // far in the past even with a plausible delay
                    scheduled
                } else {
                    match delays.stop_delay(date, &trips[trip_id].id, stop_index) {
                        Some((_, departure_delay)) => scheduled + TimeDelta::seconds(i64::from(departure_delay)),
                        None => scheduled,
                    }
                };
                if departure >= reach {
                    return Some((trip_id, date));
                }
            }
        }
        None
    }

    fn latest_arriving_before(
        &self,
        trips: &[Trip],
        delays: &DelayTable,
        stop_index: usize,
        reach: NaiveDateTime,
    ) -> Option<(TripId, NaiveDate)> {
        let base = reach.date();
        for date in [base, base - Days::new(1)] {
            let Some(on_date) = self.trips_by_date.get(&date) else {
                continue;
            };
            for &trip_id in on_date.iter().rev() {
                let scheduled = trips[trip_id].stop_times[stop_index].arrival_at(date);
                let arrival = match delays.stop_delay(date, &trips[trip_id].id, stop_index) {
                    Some((arrival_delay, _)) => scheduled + TimeDelta::seconds(i64::from(arrival_delay)),
                    None => scheduled,
                };
                if arrival <= reach {
                    return Some((trip_id, date));
                }
            }
        }
        None
    }

    /// Up to `count` trip times at the pattern position `stop_index` past
    /// `time` in the given direction, each shifted by `offset_seconds`
    /// towards the query origin (the walking time needed to reach the stop).
    /// Feeds the range orchestrator with candidate search start times.
    pub fn first_trip_times_at_stop(
        &self,
        trips: &[Trip],
        stop_index: usize,
        time: NaiveDateTime,
        offset_seconds: i64,
        count: usize,
        forward: bool,
    ) -> Vec<NaiveDateTime> {
        let base = time.date();
        let mut times = Vec::new();
        if forward {
            for date in [base - Days::new(1), base, base + Days::new(1)] {
                let Some(on_date) = self.trips_by_date.get(&date) else {
                    continue;
                };
                for &trip_id in on_date {
                    let departure = trips[trip_id].stop_times[stop_index].departure_at(date)
                        - TimeDelta::seconds(offset_seconds);
                    if departure > time {
                        times.push(departure);
                    }
                    if times.len() >= count {
                        return times;
                    }
                }
            }
        } else {
            for date in [base, base - Days::new(1)] {
                let Some(on_date) = self.trips_by_date.get(&date) else {
                    continue;
                };
                for &trip_id in on_date.iter().rev() {
                    let arrival = trips[trip_id].stop_times[stop_index].arrival_at(date)
                        + TimeDelta::seconds(offset_seconds);
                    if arrival < time {
                        times.push(arrival);
                    }
                    if times.len() >= count {
                        return times;
                    }
                }
            }
        }
        times
    }
}

type IndexedStop = GeomWithData<[f64; 2], StopId>;

/// The immutable post-load transit graph.
#[derive(Debug)]
pub struct TransitNetwork {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub forbidden_crossings: Vec<ForbiddenCrossingLine>,
    stops_by_id: HashMap<String, StopId>,
    stops_by_name: HashMap<String, Vec<StopId>>,
    routes_by_id: HashMap<String, RouteId>,
    trips_by_id: HashMap<String, TripId>,
    spatial: RTree<IndexedStop>,
}

impl TransitNetwork {
    /// Assembles the arena from loader output, derives the lookup tables and
    /// validates the §3 invariants. Stop `routes` lists are rebuilt here;
    /// trips of each route and date are sorted by first-stop departure.
    pub fn new(
        stops: Vec<Stop>,
        mut routes: Vec<Route>,
        trips: Vec<Trip>,
        forbidden_crossings: Vec<ForbiddenCrossingLine>,
    ) -> Result<Self, Error> {
        for (route_id, route) in routes.iter().enumerate() {
            for &stop in &route.stops {
                if stop >= stops.len() {
                    return Err(Error::InternalData(format!(
                        "route {} references stop index {stop} outside the arena",
                        route.id
                    )));
                }
            }
            for trip_ids in route.trips_by_date.values() {
                for &trip_id in trip_ids {
                    let trip = trips.get(trip_id).ok_or_else(|| {
                        Error::InternalData(format!(
                            "route {} references trip index {trip_id} outside the arena",
                            route.id
                        ))
                    })?;
                    if trip.route != route_id {
                        return Err(Error::InternalData(format!(
                            "trip {} is listed on route {} but points elsewhere",
                            trip.id, route.id
                        )));
                    }
                    validate_trip_times(trip, route)?;
                }
            }
        }
        for stop in &stops {
            for transfer in &stop.transfers {
                if transfer.from >= stops.len() || transfer.to >= stops.len() {
                    return Err(Error::InternalData(format!(
                        "transfer at stop {} references a stop outside the arena",
                        stop.id
                    )));
                }
            }
        }

        let mut stops = stops;
        for stop in &mut stops {
            stop.routes.clear();
        }
        for (route_id, route) in routes.iter().enumerate() {
            for &stop in &route.stops {
                if !stops[stop].routes.contains(&route_id) {
                    stops[stop].routes.push(route_id);
                }
            }
        }
        for route in &mut routes {
            for trip_ids in route.trips_by_date.values_mut() {
                trip_ids.sort_by_key(|&t| {
                    let first = trips[t].stop_times[0];
                    (first.departure_day, first.departure)
                });
            }
        }

        let mut stops_by_id = HashMap::with_capacity(stops.len());
        let mut stops_by_name: HashMap<String, Vec<StopId>> = HashMap::new();
        for (idx, stop) in stops.iter().enumerate() {
            if stops_by_id.insert(stop.id.clone(), idx).is_some() {
                return Err(Error::InternalData(format!("duplicate stop id {}", stop.id)));
            }
            stops_by_name.entry(stop.name.clone()).or_default().push(idx);
        }
        let mut routes_by_id = HashMap::with_capacity(routes.len());
        for (idx, route) in routes.iter().enumerate() {
            if routes_by_id.insert(route.id.clone(), idx).is_some() {
                return Err(Error::InternalData(format!("duplicate route id {}", route.id)));
            }
        }
        let mut trips_by_id = HashMap::with_capacity(trips.len());
        for (idx, trip) in trips.iter().enumerate() {
            if trips_by_id.insert(trip.id.clone(), idx).is_some() {
                return Err(Error::InternalData(format!("duplicate trip id {}", trip.id)));
            }
        }
        let spatial = RTree::bulk_load(
            stops
                .iter()
                .enumerate()
                .map(|(idx, stop)| IndexedStop::new([stop.geometry.x(), stop.geometry.y()], idx))
                .collect(),
        );

        info!(
            "transit network ready: {} stops, {} routes, {} trips",
            stops.len(),
            routes.len(),
            trips.len()
        );
        Ok(TransitNetwork {
            stops,
            routes,
            trips,
            forbidden_crossings,
            stops_by_id,
            stops_by_name,
            routes_by_id,
            trips_by_id,
            spatial,
        })
    }

    pub fn stop_by_id(&self, id: &str) -> Option<StopId> {
        self.stops_by_id.get(id).copied()
    }

    pub fn route_by_id(&self, id: &str) -> Option<RouteId> {
        self.routes_by_id.get(id).copied()
    }

    pub fn trip_by_id(&self, id: &str) -> Option<TripId> {
        self.trips_by_id.get(id).copied()
    }

    /// All stops of the node sharing `name`.
    pub fn stops_by_name(&self, name: &str) -> Vec<StopId> {
        self.stops_by_name.get(name).cloned().unwrap_or_default()
    }

    /// Stops within `radius` meters of `center`.
    pub fn stops_within(&self, center: Point<f64>, radius: u32) -> Vec<StopId> {
        let (lo, hi) = geometry::radius_envelope(center, radius);
        self.spatial
            .locate_in_envelope(&AABB::from_corners(lo, hi))
            .filter(|entry| {
                simplified_distance_between(self.stops[entry.data].geometry, center) < radius
            })
            .map(|entry| entry.data)
            .collect()
    }

    /// Computes the static walking transfers between stops: every ordered
    /// pair closer than [`MAX_TRANSFER_DISTANCE`] whose straight segment
    /// does not cross a forbidden line, plus all same-name pairs regardless
    /// of distance (same-node interchange). Called once by the construction
    /// collaborator after the arena is assembled.
    pub fn build_transfers(&mut self) {
        let mut created = 0usize;
        for from in 0..self.stops.len() {
            let mut outgoing = Vec::new();
            for to in 0..self.stops.len() {
                if from == to {
                    continue;
                }
                let (a, b) = (self.stops[from].geometry, self.stops[to].geometry);
                let same_node = self.stops[from].name == self.stops[to].name;
                if !same_node && too_far_in_one_direction(a, b, MAX_TRANSFER_DISTANCE) {
                    continue;
                }
                let distance = simplified_distance_between(a, b);
                if !same_node && distance > MAX_TRANSFER_DISTANCE {
                    continue;
                }
                if crossing_forbidden(&self.forbidden_crossings, a, b) {
                    continue;
                }
                outgoing.push(Transfer { from, to, distance });
            }
            created += outgoing.len();
            self.stops[from].transfers = outgoing;
        }
        info!("created {created} walking transfers");
    }
}

fn validate_trip_times(trip: &Trip, route: &Route) -> Result<(), Error> {
    if trip.stop_times.len() != route.stops.len() {
        return Err(Error::InternalData(format!(
            "trip {} has {} stop times for a {}-stop pattern",
            trip.id,
            trip.stop_times.len(),
            route.stops.len()
        )));
    }
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid epoch");
    let mut previous: Option<NaiveDateTime> = None;
    for st in &trip.stop_times {
        let arrival = st.arrival_at(epoch);
        let departure = st.departure_at(epoch);
        if departure < arrival {
            return Err(Error::InternalData(format!(
                "trip {} departs before it arrives at a stop",
                trip.id
            )));
        }
        if let Some(prev) = previous {
            if arrival < prev {
                return Err(Error::InternalData(format!(
                    "trip {} stop times are not monotonically non-decreasing",
                    trip.id
                )));
            }
        }
        previous = Some(departure);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn same(h: u32, m: u32, day: u8) -> StopTime {
        StopTime::new(t(h, m), t(h, m), day, day)
    }

    #[test]
    fn stop_time_day_offsets_drive_date_arithmetic() {
        let st = StopTime::new(t(23, 58), t(0, 2), 0, 1);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(st.arrival_at(date).date(), date);
        assert_eq!(st.departure_at(date).date(), date + Days::new(1));
        assert!(st.arrival_at(date) < st.departure_at(date));
    }

    #[test]
    fn network_rejects_trip_with_wrong_stop_count() {
        let stops = vec![Stop::new("s1", "A", 50.0, 14.4), Stop::new("s2", "B", 50.01, 14.4)];
        let mut route = Route::new("r1", "1", "A - B", vec![0, 1]);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        route.trips_by_date.insert(date, vec![0]);
        let trips = vec![Trip::new("trip1", 0, vec![same(8, 0, 0)])];
        let err = TransitNetwork::new(stops, vec![route], trips, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InternalData(_)));
    }

    #[test]
    fn trips_are_sorted_by_first_departure_per_date() {
        let stops = vec![Stop::new("s1", "A", 50.0, 14.4), Stop::new("s2", "B", 50.01, 14.4)];
        let mut route = Route::new("r1", "1", "A - B", vec![0, 1]);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        route.trips_by_date.insert(date, vec![0, 1]);
        let trips = vec![
            Trip::new("late", 0, vec![same(9, 0, 0), same(9, 10, 0)]),
            Trip::new("early", 0, vec![same(8, 0, 0), same(8, 10, 0)]),
        ];
        let network = TransitNetwork::new(stops, vec![route], trips, Vec::new()).unwrap();
        let on_date = &network.routes[0].trips_by_date[&date];
        assert_eq!(network.trips[on_date[0]].id, "early");
        assert_eq!(network.trips[on_date[1]].id, "late");
    }

    #[test]
    fn transferable_trip_respects_direction() {
        let stops = vec![Stop::new("s1", "A", 50.0, 14.4), Stop::new("s2", "B", 50.01, 14.4)];
        let mut route = Route::new("r1", "1", "A - B", vec![0, 1]);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        route.trips_by_date.insert(date, vec![0, 1]);
        let trips = vec![
            Trip::new("t8", 0, vec![same(8, 0, 0), same(8, 10, 0)]),
            Trip::new("t9", 0, vec![same(9, 0, 0), same(9, 10, 0)]),
        ];
        let network = TransitNetwork::new(stops, vec![route], trips, Vec::new()).unwrap();
        let route = &network.routes[0];
        let delays = DelayTable::default();

        let reach = date.and_time(t(8, 30));
        let (forward_trip, _) = route
            .transferable_trip(true, &network.trips, &delays, 0, reach)
            .unwrap();
        assert_eq!(network.trips[forward_trip].id, "t9");

        let (backward_trip, _) = route
            .transferable_trip(false, &network.trips, &delays, 1, reach)
            .unwrap();
        assert_eq!(network.trips[backward_trip].id, "t8");
    }
}
