//! Shared-bike network: stations, live availability and the inter-station
//! distance matrix.
//!
//! Station positions, capacities and distances are static after
//! construction. Only the per-station bike count changes: the (external)
//! feed poller calls [`BikeNetwork::apply_station_status`] on a fixed
//! interval, and queries read the counts lock-free through per-station
//! atomics. A stale-but-consistent count is acceptable; cross-station
//! consistency is not required.

use std::sync::atomic::{AtomicU32, Ordering};

use geo::Point;
use hashbrown::HashMap;
use log::{debug, info, warn};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::BikeStationId;
use crate::model::geometry::{self, crossing_forbidden, simplified_distance_between, too_far_in_one_direction};
use crate::model::transit::{BikeLink, TransitNetwork};

#[derive(Debug)]
pub struct BikeStation {
    pub id: String,
    pub name: String,
    pub geometry: Point<f64>,
    pub capacity: u32,
    bike_count: AtomicU32,
    /// Outgoing walking links to stops.
    pub stop_links: Vec<BikeLink>,
}

impl BikeStation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64, capacity: u32) -> Self {
        BikeStation {
            id: id.into(),
            name: name.into(),
            geometry: geometry::latlon(lat, lon),
            capacity,
            bike_count: AtomicU32::new(0),
            stop_links: Vec::new(),
        }
    }

    pub fn bike_count(&self) -> u32 {
        self.bike_count.load(Ordering::Relaxed)
    }

    pub fn set_bike_count(&self, count: u32) {
        self.bike_count.store(count, Ordering::Relaxed);
    }

    pub fn has_bikes(&self) -> bool {
        self.bike_count() > 0
    }
}

/// Symmetric sparse station-to-station distance matrix in meters, produced
/// by the (external) street router. Mergeable across bike-share systems.
#[derive(Debug, Clone, Default)]
pub struct StationDistanceMatrix {
    distances: HashMap<BikeStationId, HashMap<BikeStationId, u32>>,
}

impl StationDistanceMatrix {
    pub fn add_distance(&mut self, a: BikeStationId, b: BikeStationId, distance: u32) {
        self.distances.entry(a).or_default().insert(b, distance);
        self.distances.entry(b).or_default().insert(a, distance);
    }

    pub fn distance(&self, a: BikeStationId, b: BikeStationId) -> Option<u32> {
        self.distances.get(&a)?.get(&b).copied()
    }

    /// All stations with a known distance from `station`.
    pub fn distances_from(&self, station: BikeStationId) -> impl Iterator<Item = (BikeStationId, u32)> + '_ {
        self.distances
            .get(&station)
            .into_iter()
            .flat_map(|row| row.iter().map(|(&other, &distance)| (other, distance)))
    }

    /// Folds in the matrix of another system whose station ids start at
    /// `offset` in the merged arena.
    fn merge(&mut self, other: StationDistanceMatrix, offset: usize) {
        for (a, row) in other.distances {
            let target = self.distances.entry(a + offset).or_default();
            for (b, distance) in row {
                target.insert(b + offset, distance);
            }
        }
    }
}

type IndexedStation = GeomWithData<[f64; 2], BikeStationId>;

/// All bike-share systems merged into one arena.
#[derive(Debug)]
pub struct BikeNetwork {
    pub stations: Vec<BikeStation>,
    stations_by_id: HashMap<String, BikeStationId>,
    distances: StationDistanceMatrix,
    spatial: RTree<IndexedStation>,
}

impl BikeNetwork {
    pub fn new(stations: Vec<BikeStation>, distances: StationDistanceMatrix) -> Self {
        let mut network = BikeNetwork {
            stations,
            stations_by_id: HashMap::new(),
            distances,
            spatial: RTree::new(),
        };
        network.rebuild_indexes();
        network
    }

    /// An empty network, for deployments without a bike system.
    pub fn empty() -> Self {
        BikeNetwork::new(Vec::new(), StationDistanceMatrix::default())
    }

    /// Appends another system's stations and distances.
    pub fn merge(&mut self, stations: Vec<BikeStation>, distances: StationDistanceMatrix) {
        let offset = self.stations.len();
        self.stations.extend(stations);
        self.distances.merge(distances, offset);
        self.rebuild_indexes();
        info!("bike network now has {} stations", self.stations.len());
    }

    fn rebuild_indexes(&mut self) {
        self.stations_by_id = self
            .stations
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.id.clone(), idx))
            .collect();
        self.spatial = RTree::bulk_load(
            self.stations
                .iter()
                .enumerate()
                .map(|(idx, s)| IndexedStation::new([s.geometry.x(), s.geometry.y()], idx))
                .collect(),
        );
    }

    pub fn station_by_id(&self, id: &str) -> Option<BikeStationId> {
        self.stations_by_id.get(id).copied()
    }

    pub fn distance(&self, a: BikeStationId, b: BikeStationId) -> Option<u32> {
        self.distances.distance(a, b)
    }

    pub fn distances_from(&self, station: BikeStationId) -> impl Iterator<Item = (BikeStationId, u32)> + '_ {
        self.distances.distances_from(station)
    }

    /// Stations within `radius` meters of `center`.
    pub fn stations_within(&self, center: Point<f64>, radius: u32) -> Vec<BikeStationId> {
        let (lo, hi) = geometry::radius_envelope(center, radius);
        self.spatial
            .locate_in_envelope(&AABB::from_corners(lo, hi))
            .filter(|entry| {
                simplified_distance_between(self.stations[entry.data].geometry, center) < radius
            })
            .map(|entry| entry.data)
            .collect()
    }

    /// Applies a fresh availability snapshot from the station status feed.
    /// Unknown station ids are skipped; updates are atomic per station.
    pub fn apply_station_status<'a>(&self, status: impl IntoIterator<Item = (&'a str, u32)>) {
        let mut updated = 0usize;
        for (id, count) in status {
            match self.station_by_id(id) {
                Some(idx) => {
                    self.stations[idx].set_bike_count(count);
                    updated += 1;
                }
                None => warn!("station status for unknown station {id}"),
            }
        }
        debug!("updated bike counts for {updated} stations");
    }
}

/// Links stops and bike stations within `max_distance` meters of each other,
/// in both directions, skipping pairs cut by a forbidden-crossing line.
/// Called once by the construction collaborator.
pub fn link_bike_stations(transit: &mut TransitNetwork, bikes: &mut BikeNetwork, max_distance: u32) {
    let mut created = 0usize;
    for (station_id, station) in bikes.stations.iter_mut().enumerate() {
        for stop_id in 0..transit.stops.len() {
            let (a, b) = (station.geometry, transit.stops[stop_id].geometry);
            if too_far_in_one_direction(a, b, max_distance) {
                continue;
            }
            let distance = simplified_distance_between(a, b);
            if distance > max_distance || crossing_forbidden(&transit.forbidden_crossings, a, b) {
                continue;
            }
            let link = BikeLink {
                stop: stop_id,
                station: station_id,
                distance,
            };
            station.stop_links.push(link);
            transit.stops[stop_id].bike_links.push(link);
            created += 2;
        }
    }
    info!("created {created} stop/bike-station links");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_matrix_is_symmetric_and_mergeable() {
        let mut first = StationDistanceMatrix::default();
        first.add_distance(0, 1, 1200);
        let mut second = StationDistanceMatrix::default();
        second.add_distance(0, 1, 800);

        let mut network = BikeNetwork::new(
            vec![
                BikeStation::new("a", "A", 50.0, 14.4, 10),
                BikeStation::new("b", "B", 50.01, 14.4, 10),
            ],
            first,
        );
        network.merge(
            vec![
                BikeStation::new("c", "C", 50.02, 14.4, 10),
                BikeStation::new("d", "D", 50.03, 14.4, 10),
            ],
            second,
        );

        assert_eq!(network.distance(0, 1), Some(1200));
        assert_eq!(network.distance(1, 0), Some(1200));
        assert_eq!(network.distance(2, 3), Some(800));
        assert_eq!(network.distance(0, 2), None);
    }

    #[test]
    fn station_status_updates_by_feed_id() {
        let network = BikeNetwork::new(
            vec![BikeStation::new("a", "A", 50.0, 14.4, 10)],
            StationDistanceMatrix::default(),
        );
        assert!(!network.stations[0].has_bikes());
        network.apply_station_status([("a", 4), ("ghost", 2)]);
        assert_eq!(network.stations[0].bike_count(), 4);
    }
}
