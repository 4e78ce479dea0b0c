use geo::{Distance, Geodesic, Point};

use crate::models::{CanonicalRetailer, DistanceMatrix, IssueKind};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Converts a radius in meters to the central angle (radians) it spans.
pub fn radius_to_angle(radius_meters: f64) -> f64 {
    radius_meters / 1000.0 / EARTH_RADIUS_KM
}

/// Great-circle central angle between two points, in radians.
pub fn haversine_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // rounding can push `a` just past 1.0 for antipodal points
    2.0 * a.clamp(0.0, 1.0).sqrt().asin()
}

pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_angle(lat1, lon1, lat2, lon2) * EARTH_RADIUS_KM * 1000.0
}

/// Ellipsoidal (WGS84) distance in meters.
pub fn geodesic_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let origin = Point::new(lon1, lat1);
    let destination = Point::new(lon2, lat2);
    Geodesic::distance(origin, destination)
}

pub fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(f64, f64), IssueKind> {
    let (lat, lon) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(IssueKind::MissingCoordinates),
    };
    if !lat.is_finite() || !lon.is_finite() {
        return Err(IssueKind::NonFiniteCoordinates);
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(IssueKind::OutOfRange);
    }
    Ok((lat, lon))
}

/// Pairwise geodesic distances between the given retailers. Fewer than two
/// retailers yield an empty matrix.
pub fn distance_matrix(retailers: &[&CanonicalRetailer]) -> DistanceMatrix {
    if retailers.len() < 2 {
        return DistanceMatrix::empty();
    }

    let n = retailers.len();
    let mut meters = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let distance = geodesic_meters(
                retailers[i].latitude,
                retailers[i].longitude,
                retailers[j].latitude,
                retailers[j].longitude,
            );
            meters[i][j] = distance;
            meters[j][i] = distance;
        }
    }

    DistanceMatrix {
        buyer_ids: retailers.iter().map(|r| r.buyer_id.clone()).collect(),
        names: retailers.iter().map(|r| r.display_name().to_string()).collect(),
        meters,
    }
}
