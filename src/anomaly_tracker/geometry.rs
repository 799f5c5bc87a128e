//! Great-circle helpers in nautical miles

/// Mean Earth radius expressed in nautical miles (6,371 km / 1.852)
const EARTH_RADIUS_NM: f64 = 3440.065;

/// Haversine distance between two (lat, lon) points, in nautical miles
pub(crate) fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    EARTH_RADIUS_NM * angular_distance(lat1, lon1, lat2, lon2)
}

fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * a.sqrt().atan2((1.0 - a.min(1.0)).sqrt())
}

/// Initial great-circle bearing from point 1 to point 2, in radians
fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();
    y.atan2(x)
}

/// Shortest distance from `point` to the great-circle segment `start`→`end`
///
/// Uses the cross-track distance when the perpendicular foot lands on the
/// segment, otherwise the distance to the nearer endpoint. All inputs are
/// (lat, lon) in degrees.
pub(crate) fn distance_to_segment_nm(point: (f64, f64), start: (f64, f64), end: (f64, f64)) -> f64 {
    let d13 = angular_distance(start.0, start.1, point.0, point.1);
    let d12 = angular_distance(start.0, start.1, end.0, end.1);

    // Degenerate segment (repeated position): plain point distance
    if d12 < 1e-12 {
        return EARTH_RADIUS_NM * d13;
    }

    let theta13 = initial_bearing(start.0, start.1, point.0, point.1);
    let theta12 = initial_bearing(start.0, start.1, end.0, end.1);
    let delta = theta13 - theta12;

    // Foot of the perpendicular falls behind the start
    if delta.cos() < 0.0 {
        return EARTH_RADIUS_NM * d13;
    }

    let cross_track = (d13.sin() * delta.sin()).clamp(-1.0, 1.0).asin();
    let along_track = (d13.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos();

    if along_track > d12 {
        return haversine_nm(point.0, point.1, end.0, end.1);
    }

    EARTH_RADIUS_NM * cross_track.abs()
}

/// Minimum distance from `point` to the polyline through `vertices`, in nautical miles
///
/// Returns `None` for an empty polyline.
pub(crate) fn distance_to_polyline_nm(point: (f64, f64), vertices: &[(f64, f64)]) -> Option<f64> {
    match vertices {
        [] => None,
        [only] => Some(haversine_nm(point.0, point.1, only.0, only.1)),
        _ => vertices
            .windows(2)
            .map(|w| distance_to_segment_nm(point, w[0], w[1]))
            .min_by(|a, b| a.total_cmp(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_arc_minute_of_latitude_is_one_nautical_mile() {
        let d = haversine_nm(0.0, 0.0, 1.0 / 60.0, 0.0);
        assert!((d - 1.0).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_nm(38.9, -77.0, 38.9, -77.0), 0.0);
    }

    #[test]
    fn test_perpendicular_offset_from_segment() {
        // Segment along the equator, point 0.1 degrees (6 nm) north of its middle
        let d = distance_to_segment_nm((0.1, 0.05), (0.0, 0.0), (0.0, 0.1));
        assert!((d - 6.0).abs() < 0.05, "got {d}");
    }

    #[test]
    fn test_point_beyond_segment_end_uses_endpoint() {
        let beyond = distance_to_segment_nm((0.0, 0.2), (0.0, 0.0), (0.0, 0.1));
        let endpoint = haversine_nm(0.0, 0.2, 0.0, 0.1);
        assert!((beyond - endpoint).abs() < 1e-9);
    }

    #[test]
    fn test_point_behind_segment_start_uses_start() {
        let behind = distance_to_segment_nm((0.0, -0.1), (0.0, 0.0), (0.0, 0.1));
        let start = haversine_nm(0.0, -0.1, 0.0, 0.0);
        assert!((behind - start).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_uses_nearest_segment() {
        // An L-shaped track: east along the equator, then north
        let track = [(0.0, 0.0), (0.0, 0.1), (0.1, 0.1)];
        // Close to the northbound leg, far from the first leg's line
        let d = distance_to_polyline_nm((0.05, 0.11), &track).unwrap();
        assert!((d - 0.6).abs() < 0.05, "got {d}");
    }

    #[test]
    fn test_polyline_edge_cases() {
        assert_eq!(distance_to_polyline_nm((0.0, 0.0), &[]), None);
        let single = distance_to_polyline_nm((1.0 / 60.0, 0.0), &[(0.0, 0.0)]).unwrap();
        assert!((single - 1.0).abs() < 0.01);
    }
}
