//! Per-query routing state.
//!
//! One [`SearchState`] exists per connection search. It maps every route
//! point touched so far to its best reach time and one reach entry per
//! round, created lazily on first touch and dropped with the query. The
//! state is never shared between queries.

use chrono::{NaiveDate, NaiveDateTime};
use hashbrown::{HashMap, HashSet};

use crate::model::PointId;
use crate::routing::direction::TimeComparator;
use crate::settings::Settings;
use crate::{BikeStationId, MAX_TRIP_LENGTH_DAYS, ROUNDS, StopId, TripId};

/// How a route point was first reached in a round. The `from` fields point
/// towards the search origin, which is the real journey origin in a forward
/// search and the destination in a backward one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reach {
    /// The point is one of the search begin points.
    SearchStart,
    /// Arrived on board a trip entered at `from`, pattern index `from_index`.
    Trip {
        trip: TripId,
        trip_date: NaiveDate,
        from: StopId,
        from_index: usize,
    },
    /// Walked from another stop.
    Transfer { from: StopId, distance: u32 },
    /// Walked between a stop and a bike station.
    BikeTransfer { from: PointId, distance: u32 },
    /// Walked from the query's custom begin point.
    CustomTransfer { distance: u32 },
    /// Rode a shared bike from another station.
    BikeTrip { from: BikeStationId, distance: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct ReachEntry {
    pub time: NaiveDateTime,
    pub reach: Reach,
}

#[derive(Debug)]
struct PointInfo {
    best: NaiveDateTime,
    rounds: [Option<ReachEntry>; ROUNDS + 1],
}

/// The mutable heart of one search: best-so-far reach times per point and
/// the per-round entries the extractor later backtracks through.
#[derive(Debug)]
pub struct SearchState {
    comparator: TimeComparator,
    settings: Settings,
    begin_time: NaiveDateTime,
    info: HashMap<PointId, PointInfo>,
    /// Points that terminate the search, when the search ends at stops or
    /// bike stations.
    end_points: HashSet<PointId>,
    /// Walking distances from regular points to the custom end point, when
    /// the search ends at raw coordinates.
    end_custom_distances: Option<HashMap<PointId, u32>>,
    /// Best reach time at any search end point seen so far. Bounds the
    /// whole search.
    best_end_time: NaiveDateTime,
}

impl SearchState {
    pub fn new(
        comparator: TimeComparator,
        settings: Settings,
        begin_time: NaiveDateTime,
        end_points: HashSet<PointId>,
        end_custom_distances: Option<HashMap<PointId, u32>>,
    ) -> Self {
        SearchState {
            comparator,
            settings,
            begin_time,
            info: HashMap::new(),
            end_points,
            end_custom_distances,
            best_end_time: comparator.worst(),
        }
    }

    pub fn begin_time(&self) -> NaiveDateTime {
        self.begin_time
    }

    /// Marks `point` as a search begin point reached at the query time.
    pub fn set_search_start(&mut self, point: PointId) {
        let begin = self.begin_time;
        let worst = self.comparator.worst();
        let info = self.info.entry(point).or_insert_with(|| PointInfo {
            best: worst,
            rounds: [None; ROUNDS + 1],
        });
        info.best = begin;
        info.rounds[0] = Some(ReachEntry {
            time: begin,
            reach: Reach::SearchStart,
        });
        self.note_end_reach(point, begin);
    }

    pub fn best_reach(&self, point: PointId) -> NaiveDateTime {
        self.info
            .get(&point)
            .map_or_else(|| self.comparator.worst(), |info| info.best)
    }

    pub fn round_entry(&self, point: PointId, round: usize) -> Option<&ReachEntry> {
        self.info.get(&point)?.rounds[round].as_ref()
    }

    /// Reach time of `point` in `round`, or the worst possible time when
    /// the point was not reached in that round.
    pub fn round_time(&self, point: PointId, round: usize) -> NaiveDateTime {
        self.round_entry(point, round)
            .map_or_else(|| self.comparator.worst(), |entry| entry.time)
    }

    pub fn reached_by_trip(&self, point: PointId, round: usize) -> bool {
        matches!(
            self.round_entry(point, round),
            Some(ReachEntry {
                reach: Reach::Trip { .. },
                ..
            })
        )
    }

    pub fn reached_by_transfer(&self, point: PointId, round: usize) -> bool {
        matches!(
            self.round_entry(point, round),
            Some(ReachEntry {
                reach: Reach::Transfer { .. } | Reach::BikeTransfer { .. } | Reach::CustomTransfer { .. },
                ..
            })
        )
    }

    pub fn reached_by_bike_trip(&self, point: PointId, round: usize) -> bool {
        matches!(
            self.round_entry(point, round),
            Some(ReachEntry {
                reach: Reach::BikeTrip { .. },
                ..
            })
        )
    }

    /// Records `reach` at `point` in `round` if `time` beats the point's
    /// best reach so far and survives the global bounds. Returns whether
    /// the point was improved.
    pub fn try_improve(&mut self, point: PointId, time: NaiveDateTime, round: usize, reach: Reach) -> bool {
        if !self.improves_current_best(point, time) {
            return false;
        }
        let worst = self.comparator.worst();
        let info = self.info.entry(point).or_insert_with(|| PointInfo {
            best: worst,
            rounds: [None; ROUNDS + 1],
        });
        info.rounds[round] = Some(ReachEntry { time, reach });
        info.best = time;
        self.note_end_reach(point, time);
        true
    }

    fn improves_current_best(&self, point: PointId, time: NaiveDateTime) -> bool {
        if !self.comparator.improves(time, self.best_reach(point)) {
            return false;
        }
        if let Some(bound) = self.prune_bound() {
            if !self.comparator.improves(time, bound) {
                return false;
            }
        }
        let length_bound = self.comparator.offset(self.begin_time, MAX_TRIP_LENGTH_DAYS * 86_400);
        self.comparator.improves_or_equals(time, length_bound)
    }

    /// Candidates worse than the best known end reach plus the whole
    /// transfer-penalty allowance can never win the final comparison.
    fn prune_bound(&self) -> Option<NaiveDateTime> {
        (self.best_end_time != self.comparator.worst()).then(|| {
            let allowance = i64::from(self.settings.transfer_penalty()) * ROUNDS as i64;
            self.comparator.offset(self.best_end_time, allowance)
        })
    }

    fn note_end_reach(&mut self, point: PointId, time: NaiveDateTime) {
        let candidate = match &self.end_custom_distances {
            Some(distances) => {
                let Some(&distance) = distances.get(&point) else {
                    return;
                };
                let walk = self.settings.adjusted_walking_transfer_time(distance);
                self.comparator.offset(time, i64::from(walk))
            }
            None => {
                if !self.end_points.contains(&point) {
                    return;
                }
                time
            }
        };
        if self.comparator.improves(candidate, self.best_end_time) {
            self.best_end_time = candidate;
        }
    }
}
