//! Runtime configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::directions::TravelMode;
use crate::errors::ConfigError;
use crate::race::PROXIMITY_THRESHOLD_KM;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted database, e.g. `https://xyz.supabase.co`
    pub backend_url: String,
    /// Public API key sent with every backend request
    pub backend_key: String,
    /// Signed-in user token; the API key is used as bearer when absent
    pub access_token: Option<String>,
    /// Directions API key. Without one, generation runs offline.
    pub google_maps_api_key: Option<String>,
    /// Overrides the directions endpoint
    pub directions_endpoint: Option<String>,
    pub travel_mode: TravelMode,
    pub race: RaceSettings,
}

/// Tuning for a live race. Needs no backend, so it loads on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceSettings {
    /// Live clock refresh interval
    pub tick: Duration,
    /// Radius around the start and finish that triggers a transition
    pub proximity_km: f64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            proximity_km: PROXIMITY_THRESHOLD_KM,
        }
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RaceSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads `RACE_TICK_MS` and `RACE_PROXIMITY_KM`, defaulting when unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tick = match non_empty(&lookup, "RACE_TICK_MS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "RACE_TICK_MS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_TICK,
        };

        let proximity_km = match non_empty(&lookup, "RACE_PROXIMITY_KM") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(km) if km.is_finite() && km > 0.0 => km,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "RACE_PROXIMITY_KM",
                        value: raw,
                    });
                }
            },
            None => PROXIMITY_THRESHOLD_KM,
        };

        Ok(Self { tick, proximity_km })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any name → value lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let travel_mode = match non_empty(&lookup, "DIRECTIONS_TRAVEL_MODE") {
            Some(raw) => TravelMode::parse(&raw).ok_or(ConfigError::Invalid {
                name: "DIRECTIONS_TRAVEL_MODE",
                value: raw,
            })?,
            None => TravelMode::Driving,
        };

        Ok(Self {
            backend_url: non_empty(&lookup, "SEGMENTOR_BACKEND_URL")
                .ok_or(ConfigError::Missing("SEGMENTOR_BACKEND_URL"))?,
            backend_key: non_empty(&lookup, "SEGMENTOR_BACKEND_KEY")
                .ok_or(ConfigError::Missing("SEGMENTOR_BACKEND_KEY"))?,
            access_token: non_empty(&lookup, "SEGMENTOR_ACCESS_TOKEN"),
            google_maps_api_key: non_empty(&lookup, "GOOGLE_MAPS_API_KEY"),
            directions_endpoint: non_empty(&lookup, "DIRECTIONS_ENDPOINT"),
            travel_mode,
            race: RaceSettings::from_lookup(&lookup)?,
        })
    }

    pub fn is_offline(&self) -> bool {
        self.google_maps_api_key.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("SEGMENTOR_BACKEND_URL", "https://db.example.com"),
        ("SEGMENTOR_BACKEND_KEY", "anon-key"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.backend_url, "https://db.example.com");
        assert_eq!(config.race, RaceSettings::default());
        assert_eq!(config.race.tick, Duration::from_millis(100));
        assert_eq!(config.race.proximity_km, 0.05);
        assert_eq!(config.travel_mode, TravelMode::Driving);
        assert!(config.is_offline());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_missing_backend_url() {
        let err = Config::from_lookup(lookup(&[("SEGMENTOR_BACKEND_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SEGMENTOR_BACKEND_URL")));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let err = Config::from_lookup(lookup(&[
            ("SEGMENTOR_BACKEND_URL", "https://db.example.com"),
            ("SEGMENTOR_BACKEND_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SEGMENTOR_BACKEND_KEY")));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("GOOGLE_MAPS_API_KEY", "maps-key"),
            ("RACE_TICK_MS", "250"),
            ("RACE_PROXIMITY_KM", "0.02"),
            ("DIRECTIONS_TRAVEL_MODE", "Walking"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(!config.is_offline());
        assert_eq!(config.travel_mode, TravelMode::Walking);
        assert_eq!(config.race.tick, Duration::from_millis(250));
        assert_eq!(config.race.proximity_km, 0.02);
    }

    #[test]
    fn test_race_settings_without_backend() {
        let settings = RaceSettings::from_lookup(lookup(&[("RACE_PROXIMITY_KM", "0.1")])).unwrap();
        assert_eq!(settings.tick, DEFAULT_TICK);
        assert_eq!(settings.proximity_km, 0.1);
    }

    #[test]
    fn test_invalid_tick() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RACE_TICK_MS", "0"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RACE_TICK_MS", .. }));
    }

    #[test]
    fn test_invalid_proximity() {
        let err = RaceSettings::from_lookup(lookup(&[("RACE_PROXIMITY_KM", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RACE_PROXIMITY_KM", .. }));
    }

    #[test]
    fn test_unknown_travel_mode() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DIRECTIONS_TRAVEL_MODE", "teleport"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "DIRECTIONS_TRAVEL_MODE", .. }
        ));
    }
}
