//! Backtracking from a finished search to an ordered journey.
//!
//! For every round the extractor finds the destination stop with the best
//! reach time, walks its reach entries back to a search begin point and
//! turns them into legs. The candidates are then compared by reach time
//! plus the per-transfer comfort penalty; on exact ties the journey using
//! fewer rounds wins.

use chrono::NaiveDateTime;

use crate::error::Error;
use crate::model::delay::DelayTable;
use crate::model::{BikeNetwork, CustomPoint, PointId, TransitNetwork};
use crate::routing::direction::TimeComparator;
use crate::routing::journey::{Journey, Leg, LegPoint};
use crate::routing::state::{Reach, SearchState};
use crate::settings::Settings;
use crate::{BikeStationId, ROUNDS, StopId, TripId};

pub(crate) struct Extraction<'a> {
    pub transit: &'a TransitNetwork,
    pub bikes: &'a BikeNetwork,
    pub delays: &'a DelayTable,
    pub settings: Settings,
    pub comparator: TimeComparator,
    pub state: &'a SearchState,
    /// Stops the search may end at, in search direction.
    pub end_stops: &'a [StopId],
    pub end_custom: Option<&'a CustomPoint>,
    pub begin_custom: Option<&'a CustomPoint>,
}

impl Extraction<'_> {
    pub fn best_journey(&self) -> Result<Option<Journey>, Error> {
        let penalty = i64::from(self.settings.transfer_penalty());
        let mut best: Option<(NaiveDateTime, Journey)> = None;
        for round in 0..=ROUNDS {
            let Some((stop, reach_time)) = self.best_end_stop_in_round(round) else {
                continue;
            };
            let journey = self.backtrack(stop, round)?;
            let adjusted = self
                .comparator
                .offset(reach_time, journey.transfer_count as i64 * penalty);
            // strict improvement only, so exact ties keep the earlier round
            if best
                .as_ref()
                .is_none_or(|(time, _)| self.comparator.improves(adjusted, *time))
            {
                best = Some((adjusted, journey));
            }
        }
        Ok(best.map(|(_, journey)| journey))
    }

    /// The end stop with the best reach time in `round`, including the final
    /// walk when the search ends at a custom point. A stop only counts in a
    /// round that improves on all its earlier rounds.
    fn best_end_stop_in_round(&self, round: usize) -> Option<(StopId, NaiveDateTime)> {
        let mut best: Option<(StopId, NaiveDateTime)> = None;
        for &stop in self.end_stops {
            let point = PointId::Stop(stop);
            let reach = self.state.round_time(point, round);
            if reach == self.comparator.worst() {
                continue;
            }
            if round > 0 && !self.improves_all_earlier_rounds(point, round) {
                continue;
            }
            let time = match self.end_custom {
                Some(custom) => {
                    let Some(&distance) = custom.distances.get(&point) else {
                        continue;
                    };
                    let walk = self.settings.adjusted_walking_transfer_time(distance);
                    self.comparator.offset(reach, i64::from(walk))
                }
                None => reach,
            };
            if best.is_none_or(|(_, t)| self.comparator.improves(time, t)) {
                best = Some((stop, time));
            }
        }
        best
    }

    fn improves_all_earlier_rounds(&self, point: PointId, round: usize) -> bool {
        let mut best_earlier = self.comparator.worst();
        for earlier in 0..round {
            let time = self.state.round_time(point, earlier);
            if self.comparator.improves(time, best_earlier) {
                best_earlier = time;
            }
        }
        self.comparator
            .improves(self.state.round_time(point, round), best_earlier)
    }

    /// Walks the reach entries from `(stop, round)` back to a search begin
    /// point. Legs come out ordered from the search end towards the begin,
    /// which is reverse chronological for a forward search.
    fn backtrack(&self, stop: StopId, round: usize) -> Result<Journey, Error> {
        let mut legs = Vec::new();
        if let Some(custom) = self.end_custom {
            if let Some(&distance) = custom.distances.get(&PointId::Stop(stop)) {
                legs.push(self.custom_leg(custom, PointId::Stop(stop), distance, false));
            }
        }

        let mut current = PointId::Stop(stop);
        let mut current_round = round;
        'rounds: while current_round > 0 {
            // cross the walks recorded in this round first
            let mut walked = false;
            loop {
                match self.reach_of(current, current_round)? {
                    Reach::Transfer { from, distance } => {
                        legs.push(self.transfer_leg(PointId::Stop(from), current, distance));
                        current = PointId::Stop(from);
                        walked = true;
                    }
                    Reach::BikeTransfer { from, distance } => {
                        legs.push(self.transfer_leg(from, current, distance));
                        current = from;
                        walked = true;
                    }
                    _ => break,
                }
            }
            // boarded straight off the previous vehicle: make the same-stop
            // interchange explicit, except on the last leg
            if !walked && current_round != round {
                if let PointId::Stop(_) = current {
                    legs.push(self.transfer_leg(current, current, 0));
                }
            }
            match self.reach_of(current, current_round)? {
                Reach::Trip {
                    trip,
                    trip_date,
                    from,
                    from_index,
                } => {
                    legs.push(self.trip_leg(trip, trip_date, from, from_index, current)?);
                    current = PointId::Stop(from);
                    current_round -= 1;
                }
                Reach::BikeTrip { from, distance } => {
                    legs.push(self.bike_leg(from, current, distance)?);
                    current = PointId::Bike(from);
                    current_round -= 1;
                }
                Reach::SearchStart | Reach::CustomTransfer { .. } => break 'rounds,
                Reach::Transfer { .. } | Reach::BikeTransfer { .. } => {
                    return Err(Error::InternalData(
                        "search state holds a transfer cycle in one round".into(),
                    ));
                }
            }
        }

        // the round-0 entry covers the initial walk, if there was one
        loop {
            match self.reach_of(current, 0)? {
                Reach::Transfer { from, distance } => {
                    legs.push(self.transfer_leg(PointId::Stop(from), current, distance));
                    current = PointId::Stop(from);
                }
                Reach::BikeTransfer { from, distance } => {
                    legs.push(self.transfer_leg(from, current, distance));
                    current = from;
                }
                Reach::CustomTransfer { distance } => {
                    if let Some(custom) = self.begin_custom {
                        legs.push(self.custom_leg(custom, current, distance, true));
                    }
                    break;
                }
                Reach::SearchStart => break,
                _ => {
                    return Err(Error::InternalData(
                        "round 0 holds a trip reach, which only later rounds may".into(),
                    ));
                }
            }
        }

        if self.comparator.is_forward() {
            legs.reverse();
        }
        Ok(Journey::from_legs(
            legs,
            self.state.begin_time(),
            self.comparator.is_forward(),
        ))
    }

    fn reach_of(&self, point: PointId, round: usize) -> Result<Reach, Error> {
        self.state
            .round_entry(point, round)
            .map(|entry| entry.reach)
            .ok_or_else(|| Error::InternalData(format!("missing reach entry in round {round}")))
    }

    /// Orders a (search predecessor, reached point) pair into real travel
    /// direction.
    fn oriented(&self, predecessor: LegPoint, reached: LegPoint) -> (LegPoint, LegPoint) {
        if self.comparator.is_forward() {
            (predecessor, reached)
        } else {
            (reached, predecessor)
        }
    }

    fn leg_point(&self, point: PointId) -> LegPoint {
        match point {
            PointId::Stop(stop) => {
                let stop = &self.transit.stops[stop];
                LegPoint {
                    id: stop.id.clone(),
                    name: stop.name.clone(),
                    lat: stop.geometry.y(),
                    lon: stop.geometry.x(),
                }
            }
            PointId::Bike(station) => {
                let station = &self.bikes.stations[station];
                LegPoint {
                    id: station.id.clone(),
                    name: station.name.clone(),
                    lat: station.geometry.y(),
                    lon: station.geometry.x(),
                }
            }
            PointId::Custom(_) => LegPoint {
                id: String::new(),
                name: String::new(),
                lat: 0.0,
                lon: 0.0,
            },
        }
    }

    fn custom_point(&self, custom: &CustomPoint) -> LegPoint {
        LegPoint {
            id: String::new(),
            name: custom.name.clone(),
            lat: custom.geometry.y(),
            lon: custom.geometry.x(),
        }
    }

    fn transfer_leg(&self, predecessor: PointId, reached: PointId, distance: u32) -> Leg {
        let to_bike = matches!(reached, PointId::Bike(_));
        let (from, to) = self.oriented(self.leg_point(predecessor), self.leg_point(reached));
        Leg::Transfer {
            from,
            to,
            distance,
            duration: self.settings.transfer_duration(distance, to_bike),
        }
    }

    /// The walk between a custom point and the regular point next to it.
    /// On the begin side the custom point is the search predecessor; on the
    /// end side it is the reached point.
    fn custom_leg(&self, custom: &CustomPoint, regular: PointId, distance: u32, begin_side: bool) -> Leg {
        let custom_point = self.custom_point(custom);
        let regular_point = self.leg_point(regular);
        let (from, to) = if begin_side {
            self.oriented(custom_point, regular_point)
        } else {
            self.oriented(regular_point, custom_point)
        };
        Leg::Transfer {
            from,
            to,
            distance,
            duration: self.settings.adjusted_walking_transfer_time(distance),
        }
    }

    fn trip_leg(
        &self,
        trip: TripId,
        trip_date: chrono::NaiveDate,
        from: StopId,
        from_index: usize,
        reached: PointId,
    ) -> Result<Leg, Error> {
        let PointId::Stop(reached_stop) = reached else {
            return Err(Error::InternalData("a trip reach must end at a stop".into()));
        };
        let trip_data = &self.transit.trips[trip];
        let route = &self.transit.routes[trip_data.route];
        let reached_index = if self.comparator.is_forward() {
            route.stops[from_index..]
                .iter()
                .position(|&s| s == reached_stop)
                .map(|offset| from_index + offset)
        } else {
            route.stops[..=from_index].iter().rposition(|&s| s == reached_stop)
        }
        .ok_or_else(|| {
            Error::InternalData(format!(
                "stop of trip {} is not on its route's pattern past the boarding point",
                trip_data.id
            ))
        })?;
        let (board_index, alight_index) = if self.comparator.is_forward() {
            (from_index, reached_index)
        } else {
            (reached_index, from_index)
        };
        let departure = trip_data.stop_times[board_index].departure_at(trip_date);
        let arrival = trip_data.stop_times[alight_index].arrival_at(trip_date);
        let boarding_delay = self
            .delays
            .stop_delay(trip_date, &trip_data.id, board_index)
            .map(|(_, departure_delay)| departure_delay);
        let arrival_delay = self
            .delays
            .stop_delay(trip_date, &trip_data.id, alight_index)
            .map(|(arrival_delay, _)| arrival_delay);
        Ok(Leg::Trip {
            trip_id: trip_data.id.clone(),
            route_name: route.short_name.clone(),
            trip_date,
            from: self.leg_point(PointId::Stop(route.stops[board_index])),
            to: self.leg_point(PointId::Stop(route.stops[alight_index])),
            board_index,
            alight_index,
            departure,
            arrival,
            boarding_delay,
            arrival_delay,
        })
    }

    fn bike_leg(&self, from: BikeStationId, reached: PointId, distance: u32) -> Result<Leg, Error> {
        let PointId::Bike(_) = reached else {
            return Err(Error::InternalData("a bike trip must end at a station".into()));
        };
        let (from, to) = self.oriented(self.leg_point(PointId::Bike(from)), self.leg_point(reached));
        Ok(Leg::Bike {
            from,
            to,
            distance,
            duration: self.settings.full_bike_trip_time(distance),
        })
    }
}
