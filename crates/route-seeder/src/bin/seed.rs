//! Seeds generated routes around the city presets.
//!
//! Run with:
//! ```
//! SEGMENTOR_BACKEND_URL=... SEGMENTOR_BACKEND_KEY=... SEED_OWNER_ID=... \
//!     cargo run -p route-seeder --bin seed
//! ```
//!
//! `SEED_CITIES` (comma separated, default all presets), `SEED_ROUTES_PER_CITY`
//! and `SEED_BATCH_SIZE` tune the run. Without `GOOGLE_MAPS_API_KEY`, or with
//! `SEED_OFFLINE=1`, straight-line routes are generated.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use racing::backend::SupabaseClient;
use racing::config::Config;
use rand::SeedableRng;
use rand::rngs::StdRng;
use route_seeder::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let owner: Uuid = env::var("SEED_OWNER_ID")
        .context("SEED_OWNER_ID must be set to the id of the owning user")?
        .parse()
        .context("SEED_OWNER_ID is not a valid UUID")?;

    let mut seed_config = SeedConfig::default();
    if let Ok(count) = env::var("SEED_ROUTES_PER_CITY") {
        seed_config = seed_config.with_routes_per_city(count.parse()?);
    }
    if let Ok(size) = env::var("SEED_BATCH_SIZE") {
        seed_config = seed_config.with_batch_size(size.parse()?);
    }
    if env::var("SEED_OFFLINE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        seed_config = seed_config.offline();
    }

    let mut backend = SupabaseClient::new(&config.backend_url, &config.backend_key);
    if let Some(token) = &config.access_token {
        backend = backend.with_access_token(token);
    }

    let mut seeder = RouteSeeder::new(Arc::new(backend), owner).with_config(seed_config);
    match racing::route_generator(&config) {
        Some(generator) => seeder = seeder.with_generator(generator),
        None => tracing::info!("GOOGLE_MAPS_API_KEY not set, seeding straight-line routes"),
    }

    let mut rng = StdRng::from_entropy();
    let reports = match env::var("SEED_CITIES") {
        Ok(list) => {
            let names: Vec<&str> = list.split(',').filter(|s| !s.trim().is_empty()).collect();
            seeder.seed_named(&names, &mut rng).await?
        }
        Err(_) => seeder.seed_cities(&City::ALL, &mut rng).await?,
    };

    tracing::info!("Seed completed!");
    for report in &reports {
        tracing::info!("  {}: {}/{}", report.city, report.inserted, report.requested);
    }

    Ok(())
}
