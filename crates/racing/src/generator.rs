//! Route generation around a center point.
//!
//! Candidates are sampled inside a disc, snapped onto roads and accepted when
//! the road distance between them lands inside the requested bounds. A route
//! that cannot be satisfied within the attempt limits is dropped, so a batch
//! may come back shorter than requested.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::errors::GenerationError;
use crate::geodesy::{distance_km, random_point_in_disc};
use crate::models::{Coordinate, DifficultyLevel, GeneratedRoute, RouteGenerationParams};
use crate::naming::{self, RouteKind};
use crate::road_snap::RoadSnapper;

/// Seconds per kilometer used to estimate straight-line routes.
pub const OFFLINE_SECONDS_PER_KM: f64 = 300.0;

/// Upper bound (exclusive) of the random jitter added to offline estimates, in seconds.
pub const OFFLINE_TIME_JITTER_SECS: f64 = 600.0;

/// Attempt bounds for both generation modes.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorLimits {
    /// Start points tried per requested road route.
    pub road_start_attempts: usize,
    /// End points tried per road start point.
    pub road_end_attempts: usize,
    /// Start points tried per requested offline route.
    pub offline_start_attempts: usize,
    /// End points tried per offline start point.
    pub offline_end_attempts: usize,
}

impl Default for GeneratorLimits {
    fn default() -> Self {
        Self {
            road_start_attempts: 10,
            road_end_attempts: 8,
            offline_start_attempts: 20,
            offline_end_attempts: 50,
        }
    }
}

/// Generates routes that follow real roads.
#[derive(Clone)]
pub struct RouteGenerator {
    snapper: RoadSnapper,
    limits: GeneratorLimits,
}

impl RouteGenerator {
    pub fn new(snapper: RoadSnapper) -> Self {
        Self {
            snapper,
            limits: GeneratorLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: GeneratorLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Generates up to `params.count` road routes.
    ///
    /// Only invalid parameters are an error; routing failures reduce the yield.
    pub async fn generate_routes(
        &self,
        params: &RouteGenerationParams,
        rng: &mut impl Rng,
    ) -> Result<Vec<GeneratedRoute>, GenerationError> {
        params.validate().map_err(GenerationError::InvalidParams)?;

        info!(
            "Generating {} road routes within {:.1}km of ({:.4}, {:.4}), {:.1}-{:.1}km",
            params.count,
            params.radius_km,
            params.center_lat,
            params.center_lng,
            params.min_distance_km,
            params.max_distance_km
        );

        let mut routes = Vec::with_capacity(params.count);
        for index in 0..params.count {
            match self.generate_one(params, rng).await {
                Some(route) => {
                    info!(
                        "Accepted route #{}: {} ({:.2}km, {})",
                        index + 1,
                        route.name,
                        route.distance,
                        route.difficulty_level
                    );
                    routes.push(route);
                }
                None => warn!(
                    "Dropped route #{} after {} attempts",
                    index + 1,
                    self.limits.road_start_attempts
                ),
            }
        }

        info!("Generated {}/{} road routes", routes.len(), params.count);
        Ok(routes)
    }

    async fn generate_one(
        &self,
        params: &RouteGenerationParams,
        rng: &mut impl Rng,
    ) -> Option<GeneratedRoute> {
        let center = params.center();

        for attempt in 0..self.limits.road_start_attempts {
            let start = self
                .snapper
                .snap_to_road(random_point_in_disc(center, params.radius_km, rng))
                .await;

            for _ in 0..self.limits.road_end_attempts {
                let end = self
                    .snapper
                    .snap_to_road(random_point_in_disc(center, params.radius_km, rng))
                    .await;

                let Some(road) = self.snapper.road_route(start, end, rng).await else {
                    continue;
                };
                if !params.accepts(round_to_hundredths(road.distance_km)) {
                    debug!(
                        "Rejected: road distance {:.2}km outside {:.1}-{:.1}km",
                        road.distance_km, params.min_distance_km, params.max_distance_km
                    );
                    continue;
                }

                return Some(build_route(
                    RouteKind::Road,
                    start,
                    end,
                    road.distance_km,
                    road.duration_secs,
                    Some(road.waypoints),
                    rng,
                ));
            }

            debug!("No acceptable end point for start attempt {}", attempt + 1);
        }

        None
    }
}

/// Generates straight-line routes without contacting any routing service.
///
/// Distances are haversine between the two sampled points and the estimated
/// time is synthetic: `distance * 300s` plus up to ten minutes of jitter.
pub fn generate_offline_routes(
    params: &RouteGenerationParams,
    limits: &GeneratorLimits,
    rng: &mut impl Rng,
) -> Result<Vec<GeneratedRoute>, GenerationError> {
    params.validate().map_err(GenerationError::InvalidParams)?;

    let center = params.center();
    let mut routes = Vec::with_capacity(params.count);

    'routes: for index in 0..params.count {
        for _ in 0..limits.offline_start_attempts {
            let start = random_point_in_disc(center, params.radius_km, rng);

            for _ in 0..limits.offline_end_attempts {
                let end = random_point_in_disc(center, params.radius_km, rng);
                let distance = distance_km(start, end);
                if !params.accepts(round_to_hundredths(distance)) {
                    continue;
                }

                let estimated_time = distance * OFFLINE_SECONDS_PER_KM
                    + rng.gen_range(0.0..OFFLINE_TIME_JITTER_SECS);
                routes.push(build_route(
                    RouteKind::StraightLine,
                    start,
                    end,
                    distance,
                    estimated_time,
                    None,
                    rng,
                ));
                continue 'routes;
            }
        }
        warn!("Dropped offline route #{}: constraints unsatisfiable", index + 1);
    }

    info!("Generated {}/{} offline routes", routes.len(), params.count);
    Ok(routes)
}

fn build_route(
    kind: RouteKind,
    start: Coordinate,
    end: Coordinate,
    distance_km: f64,
    estimated_time: f64,
    waypoints: Option<Vec<Coordinate>>,
    rng: &mut impl Rng,
) -> GeneratedRoute {
    let difficulty = DifficultyLevel::from_distance_km(distance_km);

    GeneratedRoute {
        name: naming::route_name(rng),
        description: naming::route_description(distance_km, difficulty, rng),
        start_lat: start.lat,
        start_lng: start.lng,
        end_lat: end.lat,
        end_lng: end.lng,
        distance: round_to_hundredths(distance_km),
        estimated_time,
        difficulty_level: difficulty,
        tags: naming::route_tags(kind, difficulty, distance_km, rng),
        is_public: true,
        waypoints,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(min: f64, max: f64) -> RouteGenerationParams {
        RouteGenerationParams {
            count: 5,
            center_lat: 41.8781,
            center_lng: -87.6298,
            radius_km: 5.0,
            min_distance_km: min,
            max_distance_km: max,
        }
    }

    #[test]
    fn test_offline_routes_respect_bounds() {
        let mut rng = StdRng::seed_from_u64(2024);
        let p = params(2.0, 6.0);
        let routes = generate_offline_routes(&p, &GeneratorLimits::default(), &mut rng).unwrap();

        assert!(!routes.is_empty());
        assert!(routes.len() <= 5);
        for route in &routes {
            assert!(route.distance >= 2.0 && route.distance <= 6.0);
            assert_eq!(
                route.difficulty_level,
                DifficultyLevel::from_distance_km(distance_km(route.start(), route.end()))
            );
            assert!(route.is_public);
            assert!(route.waypoints.is_none());
            assert!(route.tags.contains(&"straight-line".to_string()));
            let base = distance_km(route.start(), route.end()) * OFFLINE_SECONDS_PER_KM;
            assert!(route.estimated_time >= base);
            assert!(route.estimated_time < base + OFFLINE_TIME_JITTER_SECS);
        }
    }

    #[test]
    fn test_offline_unsatisfiable_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        // Two points inside a 1km disc can never be 50km apart.
        let p = RouteGenerationParams {
            radius_km: 1.0,
            ..params(50.0, 60.0)
        };
        let routes = generate_offline_routes(&p, &GeneratorLimits::default(), &mut rng).unwrap();
        assert!(routes.is_empty());
    }

    #[test]
    fn test_offline_rejects_invalid_params() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = params(6.0, 2.0);
        assert!(generate_offline_routes(&p, &GeneratorLimits::default(), &mut rng).is_err());
    }

    #[test]
    fn test_offline_bounds_hold_after_rounding() {
        let mut rng = StdRng::seed_from_u64(5);
        // Narrow enough that raw distances rounding onto 2.00 or 2.02 must be rejected.
        let p = RouteGenerationParams {
            count: 3,
            radius_km: 2.0,
            ..params(2.004, 2.016)
        };
        let limits = GeneratorLimits {
            offline_start_attempts: 200,
            offline_end_attempts: 200,
            ..GeneratorLimits::default()
        };
        let routes = generate_offline_routes(&p, &limits, &mut rng).unwrap();
        for route in &routes {
            assert_eq!(route.distance, 2.01);
        }
    }

    #[test]
    fn test_round_to_hundredths() {
        assert_eq!(round_to_hundredths(4.256), 4.26);
        assert_eq!(round_to_hundredths(2.0), 2.0);
    }
}
