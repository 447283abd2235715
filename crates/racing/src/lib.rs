pub mod backend;
pub mod config;
pub mod directions;
pub mod errors;
pub mod generator;
pub mod geodesy;
pub mod geolocation;
pub mod gpx_export;
pub mod models;
pub mod naming;
pub mod race;
pub mod race_controller;
pub mod road_snap;

use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::{
    config::Config,
    directions::GoogleDirectionsClient,
    errors::GenerationError,
    generator::{GeneratorLimits, RouteGenerator, generate_offline_routes},
    models::{GeneratedRoute, RouteGenerationParams},
    road_snap::RoadSnapper,
};

/// Builds a road-following generator when a directions key is configured.
pub fn route_generator(config: &Config) -> Option<RouteGenerator> {
    let api_key = config.google_maps_api_key.as_ref()?;
    let mut client = GoogleDirectionsClient::new(api_key.clone());
    if let Some(endpoint) = &config.directions_endpoint {
        client = client.with_endpoint(endpoint.clone());
    }
    let snapper = RoadSnapper::new(Arc::new(client)).with_travel_mode(config.travel_mode);
    Some(RouteGenerator::new(snapper))
}

/// Generates routes on real roads, or straight-line routes when no
/// generator is available.
pub async fn generate(
    generator: Option<&RouteGenerator>,
    params: &RouteGenerationParams,
    rng: &mut impl Rng,
) -> Result<Vec<GeneratedRoute>, GenerationError> {
    match generator {
        Some(generator) => generator.generate_routes(params, rng).await,
        None => {
            info!("No directions service configured, generating straight-line routes");
            generate_offline_routes(params, &GeneratorLimits::default(), rng)
        }
    }
}
