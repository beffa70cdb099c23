//! Journey results handed back to callers.
//!
//! A journey is a chronological sequence of legs annotated with totals. The
//! values are plain serde-serializable data so the (external) wire layer can
//! encode them directly.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::model::delay::DelayTable;

/// A stop, bike station or custom point as it appears in a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegPoint {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One segment of a journey. Every trip leg is bracketed by transfer legs
/// (possibly zero-distance same-stop interchanges) except at the journey
/// ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Leg {
    /// A ride on one scheduled trip, boarding and alighting at the given
    /// pattern indices. Times are the static schedule; the delay fields
    /// carry the overlay's correction when one is known.
    Trip {
        trip_id: String,
        route_name: String,
        trip_date: NaiveDate,
        from: LegPoint,
        to: LegPoint,
        board_index: usize,
        alight_index: usize,
        departure: NaiveDateTime,
        arrival: NaiveDateTime,
        boarding_delay: Option<i32>,
        arrival_delay: Option<i32>,
    },
    /// A walk between two route points. Zero distance marks a same-stop
    /// interchange billed at the stationary minimum.
    Transfer {
        from: LegPoint,
        to: LegPoint,
        distance: u32,
        duration: u32,
    },
    /// A shared-bike ride between two stations, including unlocking and
    /// locking.
    Bike {
        from: LegPoint,
        to: LegPoint,
        distance: u32,
        duration: u32,
    },
}

impl Leg {
    /// Walking or riding duration of a non-trip leg.
    fn fixed_duration(&self) -> Option<u32> {
        match self {
            Leg::Transfer { duration, .. } | Leg::Bike { duration, .. } => Some(*duration),
            Leg::Trip { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub legs: Vec<Leg>,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub trip_count: usize,
    pub transfer_count: usize,
    pub bike_trip_count: usize,
    /// Total walked distance in meters.
    pub walking_distance: u32,
}

impl Journey {
    /// Builds a journey from chronologically ordered legs. `anchor` is the
    /// query time: it fixes the departure of a forward journey without any
    /// trip leg and the arrival of a backward one.
    pub(crate) fn from_legs(legs: Vec<Leg>, anchor: NaiveDateTime, forward: bool) -> Journey {
        let mut trip_count = 0;
        let mut transfer_count = 0;
        let mut bike_trip_count = 0;
        let mut walking_distance = 0;
        let mut walk_total: i64 = 0;
        for leg in &legs {
            match leg {
                Leg::Trip { .. } => trip_count += 1,
                Leg::Transfer { distance, duration, .. } => {
                    transfer_count += 1;
                    walking_distance += *distance;
                    walk_total += i64::from(*duration);
                }
                Leg::Bike { duration, .. } => {
                    bike_trip_count += 1;
                    walk_total += i64::from(*duration);
                }
            }
        }
        let (departure, arrival) = if forward {
            (anchor, anchor + TimeDelta::seconds(walk_total))
        } else {
            (anchor - TimeDelta::seconds(walk_total), anchor)
        };
        let mut journey = Journey {
            legs,
            departure,
            arrival,
            trip_count,
            transfer_count,
            bike_trip_count,
            walking_distance,
        };
        journey.recompute_times();
        journey
    }

    pub fn duration(&self) -> TimeDelta {
        self.arrival - self.departure
    }

    /// Re-reads the delay overlay for every trip leg and refreshes the
    /// journey times, without re-running the search.
    pub fn restamp_delays(&mut self, delays: &DelayTable) {
        for leg in &mut self.legs {
            if let Leg::Trip {
                trip_id,
                trip_date,
                board_index,
                alight_index,
                boarding_delay,
                arrival_delay,
                ..
            } = leg
            {
                *boarding_delay = delays
                    .stop_delay(*trip_date, trip_id, *board_index)
                    .map(|(_, departure)| departure);
                *arrival_delay = delays
                    .stop_delay(*trip_date, trip_id, *alight_index)
                    .map(|(arrival, _)| arrival);
            }
        }
        self.recompute_times();
    }

    /// Anchors departure and arrival on the delay-adjusted trip legs: the
    /// journey departs as late as the first trip allows and arrives when the
    /// last trip plus any trailing walks does. Journeys without trip legs
    /// keep their query-time anchoring.
    fn recompute_times(&mut self) {
        let mut departure = None;
        let mut arrival = None;
        let mut walk_before: i64 = 0;
        let mut walk_after: i64 = 0;
        for leg in &self.legs {
            match leg {
                Leg::Trip {
                    departure: leg_departure,
                    arrival: leg_arrival,
                    boarding_delay,
                    arrival_delay,
                    ..
                } => {
                    if departure.is_none() {
                        let actual =
                            *leg_departure + TimeDelta::seconds(i64::from(boarding_delay.unwrap_or(0)));
                        departure = Some(actual - TimeDelta::seconds(walk_before));
                    }
                    arrival = Some(*leg_arrival + TimeDelta::seconds(i64::from(arrival_delay.unwrap_or(0))));
                    walk_after = 0;
                }
                other => {
                    if let Some(duration) = other.fixed_duration() {
                        walk_before += i64::from(duration);
                        walk_after += i64::from(duration);
                    }
                }
            }
        }
        if let (Some(departure), Some(arrival)) = (departure, arrival) {
            self.departure = departure;
            self.arrival = arrival + TimeDelta::seconds(walk_after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn point(name: &str) -> LegPoint {
        LegPoint {
            id: name.to_lowercase(),
            name: name.to_string(),
            lat: 50.0,
            lon: 14.4,
        }
    }

    fn trip_leg(departure: NaiveDateTime, arrival: NaiveDateTime) -> Leg {
        Leg::Trip {
            trip_id: "trip1".into(),
            route_name: "1".into(),
            trip_date: date(),
            from: point("A"),
            to: point("B"),
            board_index: 0,
            alight_index: 1,
            departure,
            arrival,
            boarding_delay: None,
            arrival_delay: None,
        }
    }

    #[test]
    fn journey_times_anchor_on_trip_legs() {
        let legs = vec![
            Leg::Transfer {
                from: point("Start"),
                to: point("A"),
                distance: 200,
                duration: 180,
            },
            trip_leg(at(8, 10), at(8, 30)),
            Leg::Transfer {
                from: point("B"),
                to: point("End"),
                distance: 100,
                duration: 90,
            },
        ];
        let journey = Journey::from_legs(legs, at(8, 0), true);
        // departs just in time for the trip, arrives after the last walk
        assert_eq!(journey.departure, at(8, 7));
        assert_eq!(journey.arrival, at(8, 31) + TimeDelta::seconds(30));
        assert_eq!(journey.trip_count, 1);
        assert_eq!(journey.transfer_count, 2);
        assert_eq!(journey.walking_distance, 300);
    }

    #[test]
    fn walk_only_journey_anchors_on_the_query_time() {
        let legs = vec![Leg::Transfer {
            from: point("A"),
            to: point("B"),
            distance: 100,
            duration: 90,
        }];
        let forward = Journey::from_legs(legs.clone(), at(9, 0), true);
        assert_eq!(forward.departure, at(9, 0));
        assert_eq!(forward.arrival, at(9, 1) + TimeDelta::seconds(30));
        let backward = Journey::from_legs(legs, at(9, 0), false);
        assert_eq!(backward.arrival, at(9, 0));
        assert_eq!(backward.departure, at(8, 58) + TimeDelta::seconds(30));
    }

    #[test]
    fn restamping_applies_fresh_delays() {
        let mut journey = Journey::from_legs(vec![trip_leg(at(8, 10), at(8, 30))], at(8, 0), true);
        let mut delays = DelayTable::default();
        delays.add_delay(date(), "trip1", 60, 120);
        delays.add_delay(date(), "trip1", 240, 240);
        journey.restamp_delays(&delays);
        assert_eq!(journey.departure, at(8, 12));
        assert_eq!(journey.arrival, at(8, 34));
        let Leg::Trip {
            boarding_delay,
            arrival_delay,
            ..
        } = &journey.legs[0]
        else {
            panic!("expected a trip leg");
        };
        assert_eq!(*boarding_delay, Some(120));
        assert_eq!(*arrival_delay, Some(240));
    }
}
