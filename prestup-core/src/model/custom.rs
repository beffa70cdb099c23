//! Ad hoc route points built from raw query coordinates.
//!
//! A custom point exists only for the lifetime of one query. Its transfers
//! to nearby stops and bike stations are computed on demand and never enter
//! the persistent network model.

use geo::Point;
use hashbrown::HashMap;

use crate::model::PointId;
use crate::model::bike::BikeNetwork;
use crate::model::geometry::{crossing_forbidden, distance_between};
use crate::model::transit::TransitNetwork;

/// A transfer between a custom point and a regular route point. Whether it
/// is walked towards or away from the custom point follows from which end of
/// the search the point sits on.
#[derive(Debug, Clone, Copy)]
pub struct CustomTransfer {
    pub point: PointId,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct CustomPoint {
    pub name: String,
    pub geometry: Point<f64>,
    pub transfers: Vec<CustomTransfer>,
    /// Transfer distances keyed by the regular end, for destination-side
    /// pruning and final-leg construction.
    pub distances: HashMap<PointId, u32>,
}

impl CustomPoint {
    /// Builds a custom point with transfers to everything within `radius`
    /// meters, honoring forbidden-crossing lines. Bike stations are included
    /// only when the query uses shared bikes.
    pub fn near(
        name: impl Into<String>,
        geometry: Point<f64>,
        transit: &TransitNetwork,
        bikes: &BikeNetwork,
        radius: u32,
        use_shared_bikes: bool,
    ) -> Self {
        let mut point = CustomPoint {
            name: name.into(),
            geometry,
            transfers: Vec::new(),
            distances: HashMap::new(),
        };
        for stop in transit.stops_within(geometry, radius) {
            point.add_transfer(PointId::Stop(stop), transit.stops[stop].geometry, transit);
        }
        if use_shared_bikes {
            for station in bikes.stations_within(geometry, radius) {
                point.add_transfer(PointId::Bike(station), bikes.stations[station].geometry, transit);
            }
        }
        point
    }

    fn add_transfer(&mut self, other: PointId, other_geometry: Point<f64>, transit: &TransitNetwork) {
        if crossing_forbidden(&transit.forbidden_crossings, self.geometry, other_geometry) {
            return;
        }
        let distance = distance_between(self.geometry, other_geometry);
        self.transfers.push(CustomTransfer { point: other, distance });
        self.distances.entry(other).or_insert(distance);
    }
}
