mod util;

use std::sync::Arc;

use chrono::TimeDelta;
use prestup_core::model::BikeNetwork;
use prestup_core::planner::{ConnectionRequest, Endpoint, JourneyPlanner};
use prestup_core::{Error, Settings};

use util::{at, standard_network};

fn planner() -> JourneyPlanner {
    JourneyPlanner::new(Arc::new(standard_network()), Arc::new(BikeNetwork::empty()))
}

fn request(h: u32, m: u32) -> ConnectionRequest {
    ConnectionRequest {
        source: Endpoint::Node("Haje".into()),
        destination: Endpoint::Node("Andel".into()),
        time: at(h, m),
        by_earliest_departure: true,
        settings: Settings::default(),
    }
}

#[test]
fn a_window_yields_one_journey_per_departure() {
    let journeys = planner()
        .find_connections_range(&request(7, 55), TimeDelta::hours(1))
        .unwrap();
    assert!(journeys.len() >= 2, "found {} journeys", journeys.len());
    assert!(journeys.windows(2).all(|pair| pair[0].departure < pair[1].departure));
    assert!(journeys.iter().all(|journey| journey.departure >= at(7, 55)));
}

#[test]
fn range_results_are_pareto_clean() {
    let journeys = planner()
        .find_connections_range(&request(7, 55), TimeDelta::hours(1))
        .unwrap();
    for journey in &journeys {
        let dominated = journeys.iter().any(|other| {
            let no_worse = other.departure >= journey.departure
                && other.arrival <= journey.arrival
                && other.transfer_count <= journey.transfer_count;
            let strictly_better = other.departure > journey.departure
                || other.arrival < journey.arrival
                || other.transfer_count < journey.transfer_count;
            no_worse && strictly_better
        });
        assert!(!dominated, "dominated journey departing {}", journey.departure);
    }
}

#[test]
fn an_empty_window_finds_nothing() {
    // the last trips of the day leave before midnight
    let result = planner().find_connections_range(&request(23, 0), TimeDelta::minutes(30));
    assert_eq!(result.unwrap_err(), Error::NotFound);
}

#[test]
fn degenerate_windows_are_rejected() {
    let planner = planner();
    for window in [TimeDelta::zero(), TimeDelta::hours(25)] {
        let result = planner.find_connections_range(&request(8, 0), window);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}

#[test]
fn backward_ranges_walk_the_window_towards_earlier_arrivals() {
    let mut request = request(9, 30);
    request.by_earliest_departure = false;
    let journeys = planner()
        .find_connections_range(&request, TimeDelta::hours(1))
        .unwrap();
    assert!(!journeys.is_empty());
    assert!(journeys.iter().all(|journey| journey.arrival <= at(9, 30)));
    assert!(journeys.windows(2).all(|pair| pair[0].departure < pair[1].departure));
}
