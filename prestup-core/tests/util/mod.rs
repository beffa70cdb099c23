//! Shared synthetic networks for the integration tests.
#![allow(dead_code)]
//!
//! The standard network is a miniature of a real city feed: a node with two
//! platforms ("Chodov"), two lines meeting at an interchange ("Muzeum"), a
//! slower direct line, a trip crossing midnight and a pair of stops nothing
//! connects. The bike system adds two stops linked only through a shared
//! bike ride.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use prestup_core::model::{
    BikeNetwork, BikeStation, ForbiddenCrossingLine, Route, StationDistanceMatrix, Stop, StopTime,
    TransitNetwork, Trip, link_bike_stations,
};
use prestup_core::{RouteId, StopId};

pub fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    service_date().and_hms_opt(h, m, 0).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[derive(Default)]
pub struct NetworkBuilder {
    stops: Vec<Stop>,
    routes: Vec<Route>,
    trips: Vec<Trip>,
    forbidden: Vec<ForbiddenCrossingLine>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        NetworkBuilder::default()
    }

    pub fn stop(&mut self, id: &str, name: &str, lat: f64, lon: f64) -> StopId {
        self.stops.push(Stop::new(id, name, lat, lon));
        self.stops.len() - 1
    }

    pub fn route(&mut self, id: &str, stops: &[StopId]) -> RouteId {
        self.routes.push(Route::new(id, id, id, stops.to_vec()));
        self.routes.len() - 1
    }

    /// A trip stopping at `times`, arriving and departing at the same
    /// minute, all on the trip's start date.
    pub fn trip(&mut self, route: RouteId, date: NaiveDate, id: &str, times: &[(u32, u32)]) {
        let stop_times = times
            .iter()
            .map(|&(h, m)| StopTime::new(t(h, m), t(h, m), 0, 0))
            .collect();
        self.trip_with_stop_times(route, date, id, stop_times);
    }

    pub fn trip_with_stop_times(&mut self, route: RouteId, date: NaiveDate, id: &str, stop_times: Vec<StopTime>) {
        self.trips.push(Trip::new(id, route, stop_times));
        self.routes[route]
            .trips_by_date
            .entry(date)
            .or_default()
            .push(self.trips.len() - 1);
    }

    pub fn forbidden_crossing(&mut self, line: ForbiddenCrossingLine) {
        self.forbidden.push(line);
    }

    pub fn build(self) -> TransitNetwork {
        let mut network = TransitNetwork::new(self.stops, self.routes, self.trips, self.forbidden)
            .expect("synthetic network must be consistent");
        network.build_transfers();
        network
    }
}

/// The standard test network. Distances: the two Chodov platforms are a few
/// dozen meters apart, the two Muzeum platforms under a hundred, everything
/// else is far out of walking range.
pub fn standard_network() -> TransitNetwork {
    let date = service_date();
    let mut builder = NetworkBuilder::new();

    let haje = builder.stop("haje", "Haje", 50.0300, 14.5300);
    let chodov1 = builder.stop("chodov1", "Chodov", 50.0310, 14.4910);
    let chodov2 = builder.stop("chodov2", "Chodov", 50.0312, 14.4913);
    let muzeum1 = builder.stop("muzeum1", "Muzeum", 50.0790, 14.4310);
    let muzeum2 = builder.stop("muzeum2", "Muzeum", 50.0797, 14.4305);
    let andel = builder.stop("andel", "Andel", 50.0710, 14.4030);
    builder.stop("kyje", "Kyje", 50.1050, 14.5450);
    builder.stop("zlicin", "Zlicin", 50.0550, 14.2900);

    let line_a = builder.route("A", &[haje, chodov1, muzeum1]);
    builder.trip(line_a, date, "a-800", &[(8, 0), (8, 5), (8, 10)]);
    builder.trip(line_a, date, "a-830", &[(8, 30), (8, 35), (8, 40)]);
    builder.trip(line_a, date, "a-900", &[(9, 0), (9, 5), (9, 10)]);

    let line_b = builder.route("B", &[muzeum2, andel]);
    builder.trip(line_b, date, "b-815", &[(8, 15), (8, 25)]);
    builder.trip(line_b, date, "b-845", &[(8, 45), (8, 55)]);
    builder.trip(line_b, date, "b-915", &[(9, 15), (9, 25)]);

    // slower than changing at Muzeum, but direct
    let line_c = builder.route("C", &[haje, andel]);
    builder.trip(line_c, date, "c-800", &[(8, 0), (8, 34)]);
    builder.trip(line_c, date, "c-830", &[(8, 30), (9, 4)]);

    let night = builder.route("N", &[chodov2, haje]);
    builder.trip_with_stop_times(
        night,
        date,
        "n-2358",
        vec![
            StopTime::new(t(23, 58), t(23, 58), 0, 0),
            StopTime::new(t(0, 8), t(0, 8), 1, 1),
        ],
    );

    builder.build()
}

/// Two stops out of walking range of each other, bridged by a pair of bike
/// stations 2 km apart by street. Stations start with bikes available.
pub fn network_with_bikes() -> (TransitNetwork, BikeNetwork) {
    let mut builder = NetworkBuilder::new();
    builder.stop("izola", "Izolovana", 50.0010, 14.4010);
    builder.stop("izolb", "Izolnice", 50.0010, 14.4450);
    let mut transit = builder.build();

    let mut distances = StationDistanceMatrix::default();
    distances.add_distance(0, 1, 2000);
    let mut bikes = BikeNetwork::new(
        vec![
            BikeStation::new("bs1", "Izolovana vypujcka", 50.0012, 14.4015, 12),
            BikeStation::new("bs2", "Izolnice vypujcka", 50.0012, 14.4448, 12),
        ],
        distances,
    );
    bikes.apply_station_status([("bs1", 5), ("bs2", 5)]);
    link_bike_stations(&mut transit, &mut bikes, 750);
    (transit, bikes)
}
