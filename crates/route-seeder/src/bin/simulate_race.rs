//! Races a freshly generated route with a simulated GPS feed.
//!
//! Run with:
//! ```
//! cargo run -p route-seeder --bin simulate_race
//! ```
//!
//! `SIMULATE_CITY` (default London), `SIMULATE_SPEED_MPS` (default 4.0) and
//! `SIMULATE_PACE_MS` (delay between fixes, default 20) tune the run. When
//! `SIMULATE_GPX_OUT` is set the raced route is also written there as GPX.
//! `RACE_TICK_MS` and `RACE_PROXIMITY_KM` tune the race controller.
//!
//! The race clock runs in real time, so reported times follow the replay pace.

use std::env;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use racing::backend::MemoryBackend;
use racing::config::RaceSettings;
use racing::generator::{GeneratorLimits, generate_offline_routes};
use racing::geolocation::ChannelLocationSource;
use racing::gpx_export::write_route_gpx;
use racing::models::RaceTarget;
use racing::race::{RaceStatus, format_finish_time};
use racing::race_controller::RaceController;
use rand::SeedableRng;
use rand::rngs::StdRng;
use route_seeder::prelude::*;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = RaceSettings::from_env()?;
    let city_name = env::var("SIMULATE_CITY").unwrap_or_else(|_| "London".to_string());
    let city = City::lookup(&city_name).with_context(|| format!("Unknown city {city_name}"))?;
    let speed_mps: f64 = env::var("SIMULATE_SPEED_MPS")
        .unwrap_or_else(|_| "4.0".to_string())
        .parse()?;
    let pace = Duration::from_millis(
        env::var("SIMULATE_PACE_MS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()?,
    );

    let mut rng = StdRng::from_entropy();
    let params = SeedConfig::default()
        .with_routes_per_city(1)
        .params_for(&city);
    let Some(route) = generate_offline_routes(&params, &GeneratorLimits::default(), &mut rng)?
        .into_iter()
        .next()
    else {
        bail!("Could not generate a route around {}", city.name);
    };
    tracing::info!("Racing {} ({:.2}km) in {}", route.name, route.distance, city.name);

    if let Ok(path) = env::var("SIMULATE_GPX_OUT") {
        write_route_gpx(&route, File::create(&path)?)?;
        tracing::info!("Wrote route GPX to {path}");
    }

    let backend = MemoryBackend::new();
    let target = RaceTarget::from_route(Uuid::new_v4(), &route);
    backend.add_target(target.clone());

    let source = ChannelLocationSource::new();
    let handle = RaceController::new(
        target,
        Uuid::new_v4(),
        Arc::new(source.clone()),
        Arc::new(backend.clone()),
    )
    .with_settings(settings)
    .spawn();

    let fixes = RaceFeed::for_route(&route)?
        .with_speed_mps(speed_mps)
        .fixes(OffsetDateTime::now_utc(), &mut rng)?;
    tracing::info!("Replaying {} GPS fixes", fixes.len());
    replay(fixes, &source, pace).await;

    let mut snapshots = handle.subscribe();
    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.status == RaceStatus::Finished && s.persist.is_some()),
    )
    .await
    .is_ok_and(|changed| changed.is_ok());
    if !finished {
        bail!("Race did not finish: {:?}", handle.snapshot().status);
    }

    let snapshot = handle.snapshot();
    if let Some(result) = &snapshot.result {
        tracing::info!(
            "Finished in {} (avg {:.1} km/h, max {:.1} km/h)",
            format_finish_time(result.elapsed),
            result.average_speed_kmh.unwrap_or_default(),
            result.max_speed_kmh
        );
    }
    tracing::info!("Persist outcome: {:?}", snapshot.persist);
    tracing::info!("Completions recorded: {}", backend.completions().len());

    handle.shutdown().await?;
    Ok(())
}
