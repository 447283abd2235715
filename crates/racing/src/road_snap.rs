//! Road snapping and road routing on top of a [`DirectionsService`].
//!
//! Neither operation fails hard: snapping degrades to the input point and a
//! failed road route is reported as `None` so the caller can reject the candidate.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::directions::{DirectionsError, DirectionsRequest, DirectionsService, TravelMode};
use crate::geodesy;
use crate::models::{Coordinate, RoadRouteResult};

/// Offset of the probe destination used to snap a point, in degrees on both axes.
pub const SNAP_PROBE_OFFSET_DEG: f64 = 0.001;

/// Probability that a road route query avoids highways.
pub const AVOID_HIGHWAYS_PROBABILITY: f64 = 0.3;

/// Probability that a road route query avoids tolls.
pub const AVOID_TOLLS_PROBABILITY: f64 = 0.2;

#[derive(Clone)]
pub struct RoadSnapper {
    directions: Arc<dyn DirectionsService>,
    travel_mode: TravelMode,
}

impl RoadSnapper {
    pub fn new(directions: Arc<dyn DirectionsService>) -> Self {
        Self {
            directions,
            travel_mode: TravelMode::Driving,
        }
    }

    pub fn with_travel_mode(mut self, travel_mode: TravelMode) -> Self {
        self.travel_mode = travel_mode;
        self
    }

    /// Moves `point` onto the nearest traversable road.
    ///
    /// Asks for a route to a point just north-east of `point` and takes the
    /// start of the first leg. Any failure returns `point` unchanged.
    pub async fn snap_to_road(&self, point: Coordinate) -> Coordinate {
        let probe = geodesy::offset(point, SNAP_PROBE_OFFSET_DEG, SNAP_PROBE_OFFSET_DEG);
        let request = DirectionsRequest {
            travel_mode: self.travel_mode,
            ..DirectionsRequest::driving(point, probe)
        };

        match self.directions.route(&request).await {
            Ok(route) => route.start_location,
            Err(e) => {
                debug!("Snap to road failed for ({:.5}, {:.5}): {e}", point.lat, point.lng);
                point
            }
        }
    }

    /// Computes the road path between two snapped points.
    ///
    /// Highway and toll avoidance are toggled at random for route variety.
    pub async fn road_route(
        &self,
        start: Coordinate,
        end: Coordinate,
        rng: &mut impl Rng,
    ) -> Option<RoadRouteResult> {
        let request = DirectionsRequest {
            origin: start,
            destination: end,
            travel_mode: self.travel_mode,
            avoid_highways: rng.r#gen::<f64>() < AVOID_HIGHWAYS_PROBABILITY,
            avoid_tolls: rng.r#gen::<f64>() < AVOID_TOLLS_PROBABILITY,
        };

        match self.directions.route(&request).await {
            Ok(route) => Some(RoadRouteResult {
                distance_km: route.distance_meters.map_or(0.0, |m| m / 1000.0),
                duration_secs: route.duration_secs.unwrap_or(0.0),
                waypoints: route.overview_path,
            }),
            Err(DirectionsError::Status(status)) => {
                warn!("Failed to get road route: {status}");
                None
            }
            Err(e) => {
                warn!("Failed to get road route: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::directions::{DirectionsRoute, DirectionsStatus};

    /// Answers every query with a fixed outcome and records the requests.
    struct ScriptedDirections {
        outcome: Option<DirectionsRoute>,
        requests: Mutex<Vec<DirectionsRequest>>,
    }

    #[async_trait]
    impl DirectionsService for ScriptedDirections {
        async fn route(
            &self,
            request: &DirectionsRequest,
        ) -> Result<DirectionsRoute, DirectionsError> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcome
                .clone()
                .ok_or(DirectionsError::Status(DirectionsStatus::ZeroResults))
        }
    }

    fn snapper(outcome: Option<DirectionsRoute>) -> (RoadSnapper, Arc<ScriptedDirections>) {
        let directions = Arc::new(ScriptedDirections {
            outcome,
            requests: Mutex::new(Vec::new()),
        });
        (RoadSnapper::new(directions.clone()), directions)
    }

    #[tokio::test]
    async fn test_snap_uses_leg_start() {
        let road_point = Coordinate::new(40.0001, -105.0002);
        let (snapper, directions) = snapper(Some(DirectionsRoute {
            start_location: road_point,
            distance_meters: Some(150.0),
            duration_secs: Some(20.0),
            overview_path: vec![],
        }));

        let input = Coordinate::new(40.0, -105.0);
        assert_eq!(snapper.snap_to_road(input).await, road_point);

        let requests = directions.requests.lock().unwrap();
        assert_eq!(requests[0].origin, input);
        assert!((requests[0].destination.lat - 40.001).abs() < 1e-12);
        assert!(!requests[0].avoid_highways);
    }

    #[tokio::test]
    async fn test_snap_falls_back_to_input() {
        let (snapper, _) = snapper(None);
        let input = Coordinate::new(40.0, -105.0);
        assert_eq!(snapper.snap_to_road(input).await, input);
    }

    #[tokio::test]
    async fn test_road_route_converts_units() {
        let path = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.02)];
        let (snapper, _) = snapper(Some(DirectionsRoute {
            start_location: path[0],
            distance_meters: Some(2250.0),
            duration_secs: Some(410.0),
            overview_path: path.clone(),
        }));
        let mut rng = StdRng::seed_from_u64(1);

        let result = snapper
            .road_route(path[0], path[1], &mut rng)
            .await
            .unwrap();
        assert_eq!(result.distance_km, 2.25);
        assert_eq!(result.duration_secs, 410.0);
        assert_eq!(result.waypoints, path);
    }

    #[tokio::test]
    async fn test_road_route_none_on_failure() {
        let (snapper, _) = snapper(None);
        let mut rng = StdRng::seed_from_u64(1);
        let a = Coordinate::new(0.0, 0.0);
        assert!(snapper.road_route(a, a, &mut rng).await.is_none());
    }

    #[tokio::test]
    async fn test_travel_mode_applies_to_every_query() {
        let (snapper, directions) = snapper(None);
        let snapper = snapper.with_travel_mode(TravelMode::Bicycling);
        let mut rng = StdRng::seed_from_u64(1);
        let a = Coordinate::new(0.0, 0.0);

        snapper.snap_to_road(a).await;
        snapper.road_route(a, a, &mut rng).await;

        let requests = directions.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.travel_mode == TravelMode::Bicycling));
    }

    #[tokio::test]
    async fn test_avoidance_flags_vary() {
        let (snapper, directions) = snapper(None);
        let mut rng = StdRng::seed_from_u64(99);
        let a = Coordinate::new(0.0, 0.0);
        for _ in 0..200 {
            snapper.road_route(a, a, &mut rng).await;
        }

        let requests = directions.requests.lock().unwrap();
        let highways = requests.iter().filter(|r| r.avoid_highways).count();
        let tolls = requests.iter().filter(|r| r.avoid_tolls).count();
        assert!((30..=90).contains(&highways), "highways avoided {highways} times");
        assert!((15..=70).contains(&tolls), "tolls avoided {tolls} times");
    }
}
