mod util;

use std::sync::Arc;

use chrono::Days;
use prestup_core::model::BikeNetwork;
use prestup_core::planner::JourneyPlanner;
use prestup_core::routing::AlternativeTrip;
use prestup_core::Error;

use util::{service_date, standard_network};

fn planner() -> JourneyPlanner {
    JourneyPlanner::new(Arc::new(standard_network()), Arc::new(BikeNetwork::empty()))
}

fn trip_ids(planner: &JourneyPlanner, found: &[AlternativeTrip]) -> Vec<String> {
    found
        .iter()
        .map(|alternative| planner.transit_network().trips[alternative.trip].id.clone())
        .collect()
}

#[test]
fn later_trips_follow_in_departure_order() {
    let planner = planner();
    let found = planner
        .alternative_trips("A", "a-800", service_date(), true, 2)
        .unwrap();
    assert_eq!(trip_ids(&planner, &found), ["a-830", "a-900"]);
    assert!(found.iter().all(|alternative| alternative.date == service_date()));
}

#[test]
fn earlier_trips_come_back_chronologically() {
    let planner = planner();
    let found = planner
        .alternative_trips("A", "a-900", service_date(), false, 2)
        .unwrap();
    assert_eq!(trip_ids(&planner, &found), ["a-800", "a-830"]);
}

#[test]
fn missing_trips_are_not_found() {
    let planner = planner();
    let result = planner.alternative_trips("A", "a-800", service_date(), true, 3);
    assert_eq!(result.unwrap_err(), Error::NotFound);
    let result = planner.alternative_trips("A", "a-800", service_date(), false, 1);
    assert_eq!(result.unwrap_err(), Error::NotFound);
}

#[test]
fn out_of_range_counts_are_rejected() {
    let planner = planner();
    for count in [0, 11] {
        let result = planner.alternative_trips("A", "a-800", service_date(), true, count);
        assert!(matches!(result, Err(Error::Validation(_))), "count {count}");
    }
}

#[test]
fn unknown_ids_and_dates_are_validation_errors() {
    let planner = planner();
    assert!(matches!(
        planner.alternative_trips("Z", "a-800", service_date(), true, 1),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        planner.alternative_trips("A", "ghost", service_date(), true, 1),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        planner.alternative_trips("A", "a-800", service_date() + Days::new(7), true, 1),
        Err(Error::Validation(_))
    ));
}
