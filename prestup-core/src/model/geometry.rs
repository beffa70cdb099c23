//! Geometric helpers shared by the network models.
//!
//! Distances between route points are straight-line distances. The exact
//! variant uses the haversine formula; the simplified variant projects
//! degrees to meters with constants tuned for the 50th parallel and is used
//! as a cheap prefilter in radius queries.

use geo::algorithm::line_intersection::line_intersection;
use geo::{Distance, Haversine, Line, Point};

/// Meters per degree of latitude.
const LAT_DEGREE_METERS: f64 = 111_113.9;
/// Meters per degree of longitude at 50 degrees north.
const LON_DEGREE_METERS_50N: f64 = 71_583.0;

/// Builds a point from latitude/longitude as they appear in feeds.
pub fn latlon(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}

/// Curvature-adjusted distance between two points in meters.
pub fn distance_between(a: Point<f64>, b: Point<f64>) -> u32 {
    Haversine.distance(a, b) as u32
}

/// Flat-projection distance in meters. Accurate enough near the 50th
/// parallel, much cheaper than [`distance_between`].
pub fn simplified_distance_between(a: Point<f64>, b: Point<f64>) -> u32 {
    let dy = (a.y() - b.y()) * LAT_DEGREE_METERS;
    let dx = (a.x() - b.x()) * LON_DEGREE_METERS_50N;
    (dy * dy + dx * dx).sqrt() as u32
}

/// Whether two points are further apart than `max_meters` along at least one
/// axis. Used to reject candidates before computing a real distance.
pub fn too_far_in_one_direction(a: Point<f64>, b: Point<f64>, max_meters: u32) -> bool {
    let lat_diff = (a.y() - b.y()).abs() * LAT_DEGREE_METERS;
    let lon_diff = (a.x() - b.x()).abs() * LON_DEGREE_METERS_50N;
    lat_diff > f64::from(max_meters) || lon_diff > f64::from(max_meters)
}

/// Degree envelope of a radius query, for use with the spatial indexes.
pub(crate) fn radius_envelope(center: Point<f64>, radius_meters: u32) -> ([f64; 2], [f64; 2]) {
    let lat_delta = f64::from(radius_meters) / LAT_DEGREE_METERS;
    let lon_delta = f64::from(radius_meters) / LON_DEGREE_METERS_50N;
    (
        [center.x() - lon_delta, center.y() - lat_delta],
        [center.x() + lon_delta, center.y() + lat_delta],
    )
}

/// A line that no walking transfer may cross, e.g. a river without a bridge.
/// Candidate transfers whose straight segment intersects the line are
/// rejected during transfer construction.
#[derive(Debug, Clone)]
pub struct ForbiddenCrossingLine {
    line: Line<f64>,
    pub comment: String,
}

impl ForbiddenCrossingLine {
    pub fn new(a: Point<f64>, b: Point<f64>, comment: impl Into<String>) -> Self {
        ForbiddenCrossingLine {
            line: Line::new(a.0, b.0),
            comment: comment.into(),
        }
    }

    /// Whether the straight segment between `from` and `to` crosses this line.
    pub fn blocks(&self, from: Point<f64>, to: Point<f64>) -> bool {
        line_intersection(self.line, Line::new(from.0, to.0)).is_some()
    }
}

/// Whether any of the lines forbids a transfer between the two points.
pub fn crossing_forbidden(lines: &[ForbiddenCrossingLine], from: Point<f64>, to: Point<f64>) -> bool {
    lines.iter().any(|line| line.blocks(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_and_simplified_distances_agree_near_prague() {
        let a = latlon(50.0755, 14.4378);
        let b = latlon(50.0865, 14.4205);
        let exact = distance_between(a, b);
        let approx = simplified_distance_between(a, b);
        let diff = exact.abs_diff(approx);
        assert!(diff < exact / 20, "exact {exact} vs approx {approx}");
    }

    #[test]
    fn crossing_line_blocks_intersecting_segment_only() {
        let river = ForbiddenCrossingLine::new(latlon(50.0, 14.40), latlon(50.1, 14.40), "river");
        assert!(river.blocks(latlon(50.05, 14.39), latlon(50.05, 14.41)));
        assert!(!river.blocks(latlon(50.05, 14.41), latlon(50.06, 14.42)));
    }
}
