//! Seeding configuration and city presets.

use racing::models::{Coordinate, RouteGenerationParams};

/// A named city center used as the origin of generated routes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl City {
    pub const NEW_YORK: City = City::new("New York", 40.7128, -74.0060);
    pub const LOS_ANGELES: City = City::new("Los Angeles", 34.0522, -118.2437);
    pub const CHICAGO: City = City::new("Chicago", 41.8781, -87.6298);
    pub const LONDON: City = City::new("London", 51.5074, -0.1278);
    pub const PARIS: City = City::new("Paris", 48.8566, 2.3522);
    pub const TOKYO: City = City::new("Tokyo", 35.6762, 139.6503);
    pub const SYDNEY: City = City::new("Sydney", -33.8688, 151.2093);

    pub const ALL: [City; 7] = [
        Self::NEW_YORK,
        Self::LOS_ANGELES,
        Self::CHICAGO,
        Self::LONDON,
        Self::PARIS,
        Self::TOKYO,
        Self::SYDNEY,
    ];

    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    /// Finds a preset by name, ignoring case and surrounding whitespace.
    pub fn lookup(name: &str) -> Option<City> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|city| city.name.eq_ignore_ascii_case(name))
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Configuration for seeding operations.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Routes requested per city.
    pub routes_per_city: usize,

    /// Sampling radius around each city center.
    pub radius_km: f64,

    pub min_distance_km: f64,
    pub max_distance_km: f64,

    /// Rows per backend insert.
    pub batch_size: usize,

    /// Generate straight-line routes even when a directions service is available.
    pub offline: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            routes_per_city: 10,
            radius_km: 5.0,
            min_distance_km: 2.0,
            max_distance_km: 10.0,
            batch_size: 50,
            offline: false,
        }
    }
}

impl SeedConfig {
    pub fn with_routes_per_city(mut self, count: usize) -> Self {
        self.routes_per_city = count;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Generation parameters for one city.
    pub fn params_for(&self, city: &City) -> RouteGenerationParams {
        RouteGenerationParams {
            count: self.routes_per_city,
            center_lat: city.lat,
            center_lng: city.lng,
            radius_km: self.radius_km,
            min_distance_km: self.min_distance_km,
            max_distance_km: self.max_distance_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(City::lookup("london"), Some(City::LONDON));
        assert_eq!(City::lookup("  NEW YORK "), Some(City::NEW_YORK));
        assert_eq!(City::lookup("Atlantis"), None);
    }

    #[test]
    fn test_presets() {
        assert_eq!(City::ALL.len(), 7);
        assert_eq!(City::SYDNEY.center(), Coordinate::new(-33.8688, 151.2093));
    }

    #[test]
    fn test_params_for_city() {
        let config = SeedConfig::default().with_routes_per_city(3);
        let params = config.params_for(&City::TOKYO);
        assert_eq!(params.count, 3);
        assert_eq!(params.center(), City::TOKYO.center());
        assert!(params.validate().is_ok());
    }
}
