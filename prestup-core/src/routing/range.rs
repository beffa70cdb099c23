//! Repeated searches across a departure window.
//!
//! The orchestrator derives candidate start times from the trips actually
//! serving the search-begin stops and their one-transfer neighbours, runs
//! one independent search per candidate in parallel, and keeps the
//! non-dominated results.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::error::Error;
use crate::model::delay::DelayTable;
use crate::model::{BikeNetwork, PointId, TransitNetwork};
use crate::routing::direction::TimeComparator;
use crate::routing::engine::{EndpointPoints, SearchRequest, search_connection};
use crate::routing::journey::Journey;
use crate::StopId;

/// Candidate start times taken per route and stop. Keeps the number of
/// inner searches proportional to the window, not the timetable.
const START_TIMES_PER_ROUTE: usize = 5;

/// Runs the single search across `window`, starting at the request time.
/// Inner searches are side-effect-free, so they run as parallel tasks and
/// only the collected results are merged.
pub fn search_connection_range(
    transit: &TransitNetwork,
    bikes: &BikeNetwork,
    delays: &DelayTable,
    request: &SearchRequest,
    window: TimeDelta,
) -> Result<Vec<Journey>, Error> {
    let comparator = TimeComparator::new(request.forward);
    let times = candidate_times(transit, request, comparator, window);
    debug!("range search fans out into {} departure times", times.len());

    let journeys = times
        .par_iter()
        .map(|&time| {
            let inner = SearchRequest {
                time,
                ..request.clone()
            };
            search_connection(transit, bikes, delays, &inner)
        })
        .collect::<Result<Vec<_>, Error>>()?;
    let mut journeys: Vec<Journey> = journeys.into_iter().flatten().collect();

    if request.forward {
        // per arrival time keep only the latest possible departure
        journeys.sort_by(|a, b| a.arrival.cmp(&b.arrival).then(b.departure.cmp(&a.departure)));
        journeys.dedup_by_key(|journey| journey.arrival);
    } else {
        // per departure time keep only the earliest possible arrival
        journeys.sort_by(|a, b| a.departure.cmp(&b.departure).then(a.arrival.cmp(&b.arrival)));
        journeys.dedup_by_key(|journey| journey.departure);
    }
    remove_dominated(&mut journeys);
    journeys.sort_by_key(|journey| journey.departure);
    journeys.dedup();

    if journeys.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(journeys)
}

/// Start times of the first few trips leaving each begin stop (or a stop
/// one walk away from one) inside the window, shifted by the walking time
/// needed to reach the stop and rounded to whole minutes so near-identical
/// candidates collapse.
fn candidate_times(
    transit: &TransitNetwork,
    request: &SearchRequest,
    comparator: TimeComparator,
    window: TimeDelta,
) -> Vec<NaiveDateTime> {
    let begin = if request.forward {
        &request.sources
    } else {
        &request.destinations
    };
    let offsets = begin_stops_with_offsets(transit, begin, request);
    let window_end = comparator.offset(request.time, window.num_seconds());

    let mut times: Vec<NaiveDateTime> = Vec::new();
    for (&stop, &offset) in &offsets {
        for &route_id in &transit.stops[stop].routes {
            let route = &transit.routes[route_id];
            let index = if request.forward {
                route.first_stop_index(stop)
            } else {
                route.last_stop_index(stop)
            };
            let Some(index) = index else { continue };
            let route_times = route.first_trip_times_at_stop(
                &transit.trips,
                index,
                request.time,
                i64::from(offset),
                START_TIMES_PER_ROUTE,
                request.forward,
            );
            for time in route_times {
                let rounded = round_to_minute(time, request.forward);
                if comparator.improves_or_equals(rounded, window_end) {
                    times.push(rounded);
                }
            }
        }
    }
    times.sort();
    if !request.forward {
        times.reverse();
    }
    times.into_iter().dedup().collect()
}

/// The begin stops themselves plus every stop one static transfer away,
/// each with the cheapest walking time needed to reach it before a trip can
/// be caught there.
fn begin_stops_with_offsets(
    transit: &TransitNetwork,
    begin: &EndpointPoints,
    request: &SearchRequest,
) -> HashMap<StopId, u32> {
    let mut offsets: HashMap<StopId, u32> = HashMap::new();
    match &begin.custom {
        Some(custom) => {
            for transfer in &custom.transfers {
                if let PointId::Stop(stop) = transfer.point {
                    let walk = request.settings.adjusted_walking_transfer_time(transfer.distance);
                    let entry = offsets.entry(stop).or_insert(walk);
                    *entry = (*entry).min(walk);
                }
            }
        }
        None => {
            for &stop in &begin.stops {
                offsets.insert(stop, 0);
            }
            for &stop in &begin.stops {
                for transfer in &transit.stops[stop].transfers {
                    let walk = request.settings.adjusted_walking_transfer_time(transfer.distance);
                    let entry = offsets.entry(transfer.to).or_insert(walk);
                    *entry = (*entry).min(walk);
                }
            }
        }
    }
    offsets
}

fn round_to_minute(time: NaiveDateTime, down: bool) -> NaiveDateTime {
    let seconds = i64::from(time.second());
    if down || seconds == 0 {
        time - TimeDelta::seconds(seconds)
    } else {
        time + TimeDelta::seconds(60 - seconds)
    }
}

/// Drops every journey another one beats on departure, arrival and transfer
/// count at once. Journeys that trade time for fewer transfers survive.
fn remove_dominated(journeys: &mut Vec<Journey>) {
    let snapshot = journeys.clone();
    journeys.retain(|journey| {
        !snapshot.iter().any(|other| {
            let no_worse = other.departure >= journey.departure
                && other.arrival <= journey.arrival
                && other.transfer_count <= journey.transfer_count;
            let strictly_better = other.departure > journey.departure
                || other.arrival < journey.arrival
                || other.transfer_count < journey.transfer_count;
            no_worse && strictly_better
        })
    });
}
