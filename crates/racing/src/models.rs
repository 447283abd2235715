use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::coord! { x: c.lng, y: c.lat }
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Self { lat: c.y, lng: c.x }
    }
}

/// Three-tier route classification derived from distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    /// Under 3 km is easy, under 7 km medium, anything longer hard.
    pub fn from_distance_km(distance_km: f64) -> Self {
        if distance_km < 3.0 {
            Self::Easy
        } else if distance_km < 7.0 {
            Self::Medium
        } else {
            Self::Hard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a route generation batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteGenerationParams {
    /// Number of routes requested.
    pub count: usize,
    pub center_lat: f64,
    pub center_lng: f64,
    /// Sampling radius around the center.
    pub radius_km: f64,
    /// Inclusive lower bound on route distance.
    pub min_distance_km: f64,
    /// Inclusive upper bound on route distance.
    pub max_distance_km: f64,
}

impl RouteGenerationParams {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.center_lat, self.center_lng)
    }

    /// Checks the batch invariants: at least one route, positive distances, min <= max.
    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err("count must be at least 1".to_string());
        }
        for (name, value) in [
            ("radius_km", self.radius_km),
            ("min_distance_km", self.min_distance_km),
            ("max_distance_km", self.max_distance_km),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be a positive number, got {value}"));
            }
        }
        if self.min_distance_km > self.max_distance_km {
            return Err(format!(
                "min_distance_km ({}) exceeds max_distance_km ({})",
                self.min_distance_km, self.max_distance_km
            ));
        }
        if !(-90.0..=90.0).contains(&self.center_lat) || !(-180.0..=180.0).contains(&self.center_lng)
        {
            return Err(format!(
                "center ({}, {}) is not a valid coordinate",
                self.center_lat, self.center_lng
            ));
        }
        Ok(())
    }

    /// Whether a candidate distance falls within the requested bounds.
    pub fn accepts(&self, distance_km: f64) -> bool {
        distance_km >= self.min_distance_km && distance_km <= self.max_distance_km
    }
}

/// A route produced by the generator, shaped like a row of the backend `routes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRoute {
    pub name: String,
    pub description: String,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
    /// Kilometers, rounded to two decimals.
    pub distance: f64,
    /// Seconds.
    pub estimated_time: f64,
    pub difficulty_level: DifficultyLevel,
    pub tags: Vec<String>,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<Coordinate>>,
}

impl GeneratedRoute {
    pub fn start(&self) -> Coordinate {
        Coordinate::new(self.start_lat, self.start_lng)
    }

    pub fn end(&self) -> Coordinate {
        Coordinate::new(self.end_lat, self.end_lng)
    }
}

/// Insert payload for the backend: a generated route tagged with its owner.
#[derive(Debug, Clone, Serialize)]
pub struct NewRouteRow<'a> {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub route: &'a GeneratedRoute,
}

/// Road path between two snapped points.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRouteResult {
    pub distance_km: f64,
    pub duration_secs: f64,
    pub waypoints: Vec<Coordinate>,
}

/// The route a race is run against, as loaded from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceTarget {
    pub id: Uuid,
    pub name: String,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
    /// Kilometers. Older rows may not carry a distance.
    pub distance: Option<f64>,
}

impl RaceTarget {
    /// Target for a route that has been stored under `id`.
    pub fn from_route(id: Uuid, route: &GeneratedRoute) -> Self {
        Self {
            id,
            name: route.name.clone(),
            start_lat: route.start_lat,
            start_lng: route.start_lng,
            end_lat: route.end_lat,
            end_lng: route.end_lng,
            distance: Some(route.distance),
        }
    }

    pub fn start(&self) -> Coordinate {
        Coordinate::new(self.start_lat, self.start_lng)
    }

    pub fn end(&self) -> Coordinate {
        Coordinate::new(self.end_lat, self.end_lng)
    }

    /// Total distance when it is known and usable as a denominator.
    pub fn total_distance_km(&self) -> Option<f64> {
        self.distance.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// A finished race as recorded in the backend `route_completions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCompletion {
    pub user_id: Uuid,
    pub route_id: Uuid,
    /// Whole elapsed seconds.
    pub completion_time: i64,
    /// km/h; absent when the route has no recorded distance.
    pub average_speed: Option<f64>,
    /// km/h
    pub max_speed: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub completion_date: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RouteGenerationParams {
        RouteGenerationParams {
            count: 3,
            center_lat: 40.7128,
            center_lng: -74.0060,
            radius_km: 5.0,
            min_distance_km: 2.0,
            max_distance_km: 8.0,
        }
    }

    #[test]
    fn test_difficulty_thresholds() {
        assert_eq!(DifficultyLevel::from_distance_km(2.5), DifficultyLevel::Easy);
        assert_eq!(DifficultyLevel::from_distance_km(2.999), DifficultyLevel::Easy);
        assert_eq!(DifficultyLevel::from_distance_km(3.0), DifficultyLevel::Medium);
        assert_eq!(DifficultyLevel::from_distance_km(5.0), DifficultyLevel::Medium);
        assert_eq!(DifficultyLevel::from_distance_km(7.0), DifficultyLevel::Hard);
        assert_eq!(DifficultyLevel::from_distance_km(9.0), DifficultyLevel::Hard);
    }

    #[test]
    fn test_params_validation() {
        assert!(params().validate().is_ok());

        let zero_count = RouteGenerationParams { count: 0, ..params() };
        assert!(zero_count.validate().is_err());

        let inverted = RouteGenerationParams {
            min_distance_km: 9.0,
            ..params()
        };
        assert!(inverted.validate().is_err());

        let negative_radius = RouteGenerationParams {
            radius_km: -1.0,
            ..params()
        };
        assert!(negative_radius.validate().is_err());
    }

    #[test]
    fn test_accepts_is_inclusive() {
        let p = params();
        assert!(p.accepts(2.0));
        assert!(p.accepts(8.0));
        assert!(!p.accepts(1.99));
        assert!(!p.accepts(8.01));
    }

    #[test]
    fn test_generated_route_serializes_column_names() {
        let route = GeneratedRoute {
            name: "Harbor Loop Trail 7".to_string(),
            description: "desc".to_string(),
            start_lat: 1.0,
            start_lng: 2.0,
            end_lat: 3.0,
            end_lng: 4.0,
            distance: 4.25,
            estimated_time: 900.0,
            difficulty_level: DifficultyLevel::Medium,
            tags: vec!["auto-generated".to_string()],
            is_public: true,
            waypoints: None,
        };
        let owner = Uuid::new_v4();
        let json = serde_json::to_value(NewRouteRow {
            user_id: owner,
            route: &route,
        })
        .unwrap();

        assert_eq!(json["difficulty_level"], "medium");
        assert_eq!(json["start_lng"], 2.0);
        assert_eq!(json["user_id"], owner.to_string());
        assert!(json.get("waypoints").is_none());
    }

    #[test]
    fn test_race_target_ignores_missing_distance() {
        let target = RaceTarget {
            id: Uuid::new_v4(),
            name: "Bridge Run".to_string(),
            start_lat: 0.0,
            start_lng: 0.0,
            end_lat: 0.0,
            end_lng: 0.01,
            distance: Some(0.0),
        };
        assert_eq!(target.total_distance_km(), None);
    }
}
