use crate::coordinate::Coordinate;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two coordinates, using the haversine formula.
pub fn haversine_distance(p1: Coordinate, p2: Coordinate) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();

    let h = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);

    2. * EARTH_RADIUS_M * f64::atan2(f64::sqrt(h), f64::sqrt(1. - h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!((actual - expected).abs() <= tolerance, "{actual} is not within {tolerance} of {expected}");
    }

    #[test]
    fn same_point_is_zero() {
        let p = Coordinate::new(56.175188, 10.196123);
        assert_eq!(haversine_distance(p, p), 0.);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            (Coordinate::new(10., 10.), Coordinate::new(10.0001, 10.)),
            (Coordinate::new(-33.8688, 151.2093), Coordinate::new(51.5074, -0.1278)),
            (Coordinate::new(89.9, 0.), Coordinate::new(-89.9, 180.)),
        ];

        for (a, b) in pairs {
            assert_eq!(haversine_distance(a, b), haversine_distance(b, a));
        }
    }

    #[test]
    fn one_ten_thousandth_degree_of_latitude() {
        // 1e-4 degrees of arc on a 6371 km sphere
        let d = haversine_distance(Coordinate::new(10., 10.), Coordinate::new(10.0001, 10.));
        assert_close(d, 11.119, 0.001);
    }

    #[test]
    fn quarter_meridian() {
        let d = haversine_distance(Coordinate::new(0., 0.), Coordinate::new(90., 0.));
        assert_close(d, EARTH_RADIUS_M * std::f64::consts::FRAC_PI_2, 1e-6);
    }

    #[test]
    fn antipodes() {
        let d = haversine_distance(Coordinate::new(0., 0.), Coordinate::new(0., 180.));
        assert_close(d, EARTH_RADIUS_M * std::f64::consts::PI, 1e-6);
    }

    #[test]
    fn nan_propagates() {
        let d = haversine_distance(Coordinate::new(f64::NAN, 0.), Coordinate::new(0., 0.));
        assert!(d.is_nan());
    }
}
