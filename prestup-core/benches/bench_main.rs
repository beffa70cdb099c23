use std::hint::black_box;

use chrono::{NaiveDate, NaiveTime};
use criterion::{Criterion, criterion_group, criterion_main};

use prestup_core::model::{DelayTable, Route, Stop, StopTime, TransitNetwork, Trip};
use prestup_core::prelude::*;
use prestup_core::routing::engine::{EndpointPoints, SearchRequest};

/// A grid of parallel lines crossing one shared corridor, with trips every
/// ten minutes over a whole day. Small against a city feed, but large
/// enough to exercise the round loop and the transfer relaxation.
fn grid_network() -> TransitNetwork {
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let lines = 12usize;
    let stops_per_line = 24usize;

    let mut stops = Vec::new();
    let mut routes = Vec::new();
    let mut trips = Vec::new();
    for line in 0..lines {
        let lat = 50.00 + line as f64 * 0.012;
        let mut pattern = Vec::new();
        for position in 0..stops_per_line {
            let id = format!("l{line}s{position}");
            let name = if position == stops_per_line / 2 {
                format!("Uzel {position}")
            } else {
                format!("Zastavka {line}-{position}")
            };
            stops.push(Stop::new(id, name, lat, 14.30 + position as f64 * 0.004));
            pattern.push(line * stops_per_line + position);
        }
        let mut route = Route::new(format!("r{line}"), format!("{line}"), format!("Linka {line}"), pattern);
        let mut on_date = Vec::new();
        for departure in 0..90 {
            let start_minutes = 5 * 60 + departure * 10;
            let stop_times = (0..stops_per_line)
                .map(|position| {
                    let minutes = (start_minutes + position as u32 * 2) % (24 * 60);
                    let day = ((start_minutes + position as u32 * 2) / (24 * 60)) as u8;
                    let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap();
                    StopTime::new(time, time, day, day)
                })
                .collect();
            trips.push(Trip::new(format!("r{line}t{departure}"), line, stop_times));
            on_date.push(trips.len() - 1);
        }
        route.trips_by_date.insert(date, on_date);
        routes.push(route);
    }

    let mut network = TransitNetwork::new(stops, routes, trips, Vec::new()).unwrap();
    network.build_transfers();
    network
}

fn bench_search(c: &mut Criterion) {
    let transit = grid_network();
    let bikes = BikeNetwork::empty();
    let delays = DelayTable::default();
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let request = SearchRequest {
        sources: EndpointPoints {
            stops: vec![0],
            stations: Vec::new(),
            custom: None,
        },
        destinations: EndpointPoints {
            stops: vec![transit.stops.len() - 1],
            stations: Vec::new(),
            custom: None,
        },
        time: date.and_hms_opt(8, 0, 0).unwrap(),
        forward: true,
        settings: Settings::default(),
    };

    c.bench_function("connection_search_grid", |b| {
        b.iter(|| search_connection(&transit, &bikes, &delays, black_box(&request)).unwrap())
    });

    let backward = SearchRequest {
        forward: false,
        time: date.and_hms_opt(18, 0, 0).unwrap(),
        ..request.clone()
    };
    c.bench_function("connection_search_grid_backward", |b| {
        b.iter(|| search_connection(&transit, &bikes, &delays, black_box(&backward)).unwrap())
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
