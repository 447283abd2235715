//! Geographic primitives shared by route generation and race timing.

use geo::{Distance as _, Haversine, Point};
use rand::Rng;

use crate::models::Coordinate;

/// Mean earth radius used for all proximity math.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equirectangular approximation used when sampling: one degree spans ~111 km.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two points in kilometers.
pub fn distance_km(p1: Coordinate, p2: Coordinate) -> f64 {
    let d_lat = (p2.lat - p1.lat).to_radians();
    let d_lng = (p2.lng - p1.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + p1.lat.to_radians().cos() * p2.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Samples a point within `radius_km` of `center`.
///
/// The angle is uniform and the radius fraction is drawn linearly, so samples
/// cluster toward the center rather than covering the disc uniformly by area.
pub fn random_point_in_disc(center: Coordinate, radius_km: f64, rng: &mut impl Rng) -> Coordinate {
    let radius_degrees = radius_km / KM_PER_DEGREE;
    let angle = rng.r#gen::<f64>() * std::f64::consts::TAU;
    let distance = rng.r#gen::<f64>() * radius_degrees;

    Coordinate {
        lat: center.lat + distance * angle.cos(),
        lng: center.lng + distance * angle.sin(),
    }
}

/// Shifts a point by raw degree deltas.
pub fn offset(point: Coordinate, d_lat: f64, d_lng: f64) -> Coordinate {
    Coordinate {
        lat: point.lat + d_lat,
        lng: point.lng + d_lng,
    }
}

/// Length of a polyline in kilometers.
pub fn path_length_km(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            Haversine.distance(
                Point::new(w[0].lng, w[0].lat),
                Point::new(w[1].lng, w[1].lat),
            )
        })
        .sum::<f64>()
        / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinate::new(51.5074, -0.1278);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let d = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_equator_five_km() {
        let d = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.045));
        assert!((d - 5.004).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_random_point_within_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        let center = Coordinate::new(48.8566, 2.3522);
        for _ in 0..500 {
            let p = random_point_in_disc(center, 5.0, &mut rng);
            let d_lat = p.lat - center.lat;
            let d_lng = p.lng - center.lng;
            let degrees = (d_lat * d_lat + d_lng * d_lng).sqrt();
            assert!(degrees <= 5.0 / KM_PER_DEGREE + 1e-12);
        }
    }

    #[test]
    fn test_path_length_matches_single_leg() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.045);
        let along = path_length_km(&[a, b]);
        assert!((along - distance_km(a, b)).abs() < 0.01);
        assert_eq!(path_length_km(&[a]), 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lng)| Coordinate { lat, lng })
        }

        proptest! {
            #[test]
            fn prop_distance_non_negative(a in valid_coord(), b in valid_coord()) {
                prop_assert!(distance_km(a, b) >= 0.0);
            }

            #[test]
            fn prop_distance_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
            }

            #[test]
            fn prop_distance_to_self_is_zero(a in valid_coord()) {
                prop_assert_eq!(distance_km(a, a), 0.0);
            }

            #[test]
            fn prop_distance_bounded_by_half_circumference(a in valid_coord(), b in valid_coord()) {
                prop_assert!(distance_km(a, b) <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
            }
        }
    }
}
