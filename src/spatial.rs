/// Mean earth radius in meters, matching the grounding source's constant.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 points, in meters.
pub fn calc_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// True iff a coordinate pair is exactly (0, 0) — the sentinel the upstream protocol
/// uses for "unknown" rather than true absence.
pub fn is_zero_zero(lat: f64, lon: f64) -> bool {
    lat == 0.0 && lon == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let d = calc_distance_m(37.7749, -122.4194, 37.7749, -122.4194);
        assert!(d < 1e-6);
    }

    #[test]
    fn known_distance_roughly_matches() {
        // San Francisco to Los Angeles, ~559 km great-circle.
        let d = calc_distance_m(37.7749, -122.4194, 34.0522, -118.2437);
        assert!((d - 559_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn detects_zero_zero_sentinel() {
        assert!(is_zero_zero(0.0, 0.0));
        assert!(!is_zero_zero(0.0, 0.1));
        assert!(!is_zero_zero(0.1, 0.0));
    }
}
