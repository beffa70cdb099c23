//! Earlier and later direct departures on a route a traveller already uses.
//!
//! The finder walks the route's trip list from a known trip's position
//! instead of running a full search, continuing into the adjacent service
//! date when the requested date runs out of trips.

use chrono::{Days, NaiveDate};

use crate::error::Error;
use crate::model::TransitNetwork;
use crate::{RouteId, TripId};

/// Most alternatives one request may ask for.
const MAX_ALTERNATIVES: usize = 10;

/// One direct departure on the same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlternativeTrip {
    pub trip: TripId,
    pub date: NaiveDate,
}

/// Up to `count` trips on `route` next to `trip` in the requested
/// direction, chronologically ordered. The requested date is searched
/// first, then the adjacent date in the same direction.
pub fn alternative_trips(
    transit: &TransitNetwork,
    route: RouteId,
    trip: TripId,
    date: NaiveDate,
    later: bool,
    count: usize,
) -> Result<Vec<AlternativeTrip>, Error> {
    if !(1..=MAX_ALTERNATIVES).contains(&count) {
        return Err(Error::Validation(format!(
            "alternative trip count {count} is outside 1..={MAX_ALTERNATIVES}"
        )));
    }
    let route_data = transit
        .routes
        .get(route)
        .ok_or_else(|| Error::Validation(format!("unknown route index {route}")))?;
    let on_date = route_data.trips_by_date.get(&date).ok_or_else(|| {
        Error::Validation(format!("route {} has no service on {date}", route_data.id))
    })?;
    let position = on_date.iter().position(|&t| t == trip).ok_or_else(|| {
        Error::Validation(format!(
            "trip {} does not operate on route {} on {date}",
            transit.trips[trip].id, route_data.id
        ))
    })?;

    let mut found = Vec::with_capacity(count);
    if later {
        found.extend(
            on_date[position + 1..]
                .iter()
                .map(|&trip| AlternativeTrip { trip, date })
                .take(count),
        );
        if found.len() < count {
            let next_date = date + Days::new(1);
            if let Some(next) = route_data.trips_by_date.get(&next_date) {
                found.extend(
                    next.iter()
                        .map(|&trip| AlternativeTrip { trip, date: next_date })
                        .take(count - found.len()),
                );
            }
        }
    } else {
        found.extend(
            on_date[..position]
                .iter()
                .rev()
                .map(|&trip| AlternativeTrip { trip, date })
                .take(count),
        );
        if found.len() < count {
            let previous_date = date - Days::new(1);
            if let Some(previous) = route_data.trips_by_date.get(&previous_date) {
                found.extend(
                    previous
                        .iter()
                        .rev()
                        .map(|&trip| AlternativeTrip {
                            trip,
                            date: previous_date,
                        })
                        .take(count - found.len()),
                );
            }
        }
        found.reverse();
    }

    if found.len() < count {
        return Err(Error::NotFound);
    }
    Ok(found)
}
