//! Simulated GPS feed for racing a route without a device.
//!
//! The feed begins outside the start radius, walks to the start, follows the
//! route path at a steady speed and ends exactly on the finish point.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use racing::geodesy::{KM_PER_DEGREE, distance_km, offset, path_length_km};
use racing::geolocation::{ChannelLocationSource, PositionFix};
use racing::models::{Coordinate, GeneratedRoute};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("A feed needs at least two path points, got {0}")]
    TooFewPoints(usize),
    #[error("GPS jitter must be a non-negative number of meters, got {0}")]
    InvalidJitterMeters(f64),
    #[error("Invalid GPS jitter: {0}")]
    InvalidJitter(#[from] NormalError),
}

#[derive(Debug, Clone)]
pub struct RaceFeed {
    path: Vec<Coordinate>,
    speed_mps: f64,
    interval: Duration,
    approach_m: f64,
    gps_jitter_m: f64,
}

impl RaceFeed {
    pub fn new(path: Vec<Coordinate>) -> Result<Self, FeedError> {
        if path.len() < 2 {
            return Err(FeedError::TooFewPoints(path.len()));
        }
        Ok(Self {
            path,
            speed_mps: 4.0,
            interval: Duration::from_secs(1),
            approach_m: 150.0,
            gps_jitter_m: 3.0,
        })
    }

    /// Follows the road path when the route has one, else the straight line.
    pub fn for_route(route: &GeneratedRoute) -> Result<Self, FeedError> {
        match &route.waypoints {
            Some(waypoints) if waypoints.len() >= 2 => Self::new(waypoints.clone()),
            _ => Self::new(vec![route.start(), route.end()]),
        }
    }

    pub fn with_speed_mps(mut self, speed_mps: f64) -> Self {
        self.speed_mps = speed_mps;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Distance south of the start where the feed begins.
    pub fn with_approach_m(mut self, meters: f64) -> Self {
        self.approach_m = meters;
        self
    }

    pub fn with_gps_jitter(mut self, meters: f64) -> Self {
        self.gps_jitter_m = meters;
        self
    }

    /// Length of the raced path, approach excluded.
    pub fn route_length_km(&self) -> f64 {
        path_length_km(&self.path)
    }

    /// Produces the fixes, one per interval starting at `start_time`.
    pub fn fixes(
        &self,
        start_time: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<PositionFix>, FeedError> {
        if !(self.gps_jitter_m.is_finite() && self.gps_jitter_m >= 0.0) {
            return Err(FeedError::InvalidJitterMeters(self.gps_jitter_m));
        }
        let jitter = Normal::new(0.0, self.gps_jitter_m / 1000.0 / KM_PER_DEGREE)?;
        let step_km = self.speed_mps * self.interval.as_secs_f64() / 1000.0;

        let start = self.path[0];
        let approach = offset(start, -self.approach_m / 1000.0 / KM_PER_DEGREE, 0.0);

        let mut points = walk(&[approach, start], step_km);
        points.pop();
        points.extend(walk(&self.path, step_km));

        let last = points.len() - 1;
        let fixes = points
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                // The final fix is exact so the finish always triggers.
                let coordinate = if i == last {
                    point
                } else {
                    offset(point, jitter.sample(rng), jitter.sample(rng))
                };
                PositionFix::new(coordinate, start_time + self.interval * i as u32)
                    .with_speed(self.speed_mps)
            })
            .collect::<Vec<_>>();

        debug!(
            "Simulated feed with {} fixes over {:.2}km",
            fixes.len(),
            self.route_length_km()
        );
        Ok(fixes)
    }
}

/// Points at most `step_km` apart along `path`.
///
/// Every vertex of `path` is kept so the walk never cuts a corner; spacing
/// restarts at each vertex.
fn walk(path: &[Coordinate], step_km: f64) -> Vec<Coordinate> {
    let mut points = vec![path[0]];

    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let segment = distance_km(a, b);
        if segment <= 0.0 {
            continue;
        }

        if step_km > 0.0 {
            let mut along = step_km;
            while along < segment {
                let t = along / segment;
                points.push(Coordinate::new(
                    a.lat + (b.lat - a.lat) * t,
                    a.lng + (b.lng - a.lng) * t,
                ));
                along += step_km;
            }
        }
        points.push(b);
    }
    points
}

/// Publishes fixes into `source`, waiting `pace` between them.
pub async fn replay(fixes: Vec<PositionFix>, source: &ChannelLocationSource, pace: Duration) {
    for fix in fixes {
        source.publish(Ok(fix));
        tokio::time::sleep(pace).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn equator() -> Vec<Coordinate> {
        vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.045)]
    }

    #[test]
    fn test_walk_spacing() {
        let points = walk(&equator(), 0.5);
        // ~5km at 0.5km steps, plus both endpoints.
        assert_eq!(points.len(), 12);
        for pair in points.windows(2).take(10) {
            assert!((distance_km(pair[0], pair[1]) - 0.5).abs() < 1e-6);
        }
        assert_eq!(points.last(), Some(&Coordinate::new(0.0, 0.045)));
    }

    #[test]
    fn test_walk_carries_across_segments() {
        let path = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.003),
            Coordinate::new(0.003, 0.003),
        ];
        let points = walk(&path, 0.2);

        assert!(points.contains(&path[1]), "corner vertex skipped");
        assert_eq!(points.last(), Some(&path[2]));
        for pair in points.windows(2) {
            assert!(distance_km(pair[0], pair[1]) <= 0.2 + 1e-9);
        }
        let total: f64 = points.windows(2).map(|p| distance_km(p[0], p[1])).sum();
        assert!((total - path_length_km(&path)).abs() < 1e-4);
    }

    #[test]
    fn test_feed_starts_outside_and_ends_on_finish() {
        let mut rng = StdRng::seed_from_u64(4);
        let feed = RaceFeed::new(equator()).unwrap().with_speed_mps(10.0);
        let fixes = feed.fixes(OffsetDateTime::UNIX_EPOCH, &mut rng).unwrap();

        let start = Coordinate::new(0.0, 0.0);
        assert!(distance_km(fixes[0].coordinate, start) > 0.1);
        assert_eq!(
            fixes.last().unwrap().coordinate,
            Coordinate::new(0.0, 0.045)
        );
        assert!(fixes.windows(2).all(|f| f[0].timestamp < f[1].timestamp));
        assert!((fixes[0].speed_kmh() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_short_path() {
        assert!(matches!(
            RaceFeed::new(vec![Coordinate::new(0.0, 0.0)]),
            Err(FeedError::TooFewPoints(1))
        ));
    }

    #[test]
    fn test_rejects_negative_jitter() {
        let mut rng = StdRng::seed_from_u64(4);
        let feed = RaceFeed::new(equator()).unwrap().with_gps_jitter(-1.0);
        assert!(matches!(
            feed.fixes(OffsetDateTime::UNIX_EPOCH, &mut rng),
            Err(FeedError::InvalidJitterMeters(m)) if m == -1.0
        ));
    }
}
