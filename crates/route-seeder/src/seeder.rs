//! Batch generation and insertion of routes.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use racing::backend::{BackendClient, BackendError};
use racing::errors::GenerationError;
use racing::generator::RouteGenerator;

use crate::config::{City, SeedConfig};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Route generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Unknown city: {0}")]
    UnknownCity(String),
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
}

/// Outcome of seeding one city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub city: &'static str,
    pub requested: usize,
    pub inserted: usize,
}

/// Generates routes around city centers and stores them for one owner.
pub struct RouteSeeder {
    backend: Arc<dyn BackendClient>,
    generator: Option<RouteGenerator>,
    owner: Uuid,
    config: SeedConfig,
}

impl RouteSeeder {
    pub fn new(backend: Arc<dyn BackendClient>, owner: Uuid) -> Self {
        Self {
            backend,
            generator: None,
            owner,
            config: SeedConfig::default(),
        }
    }

    /// Follows real roads through this generator unless the config says offline.
    pub fn with_generator(mut self, generator: RouteGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_config(mut self, config: SeedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Resolves city names and seeds each of them.
    pub async fn seed_named(
        &self,
        names: &[&str],
        rng: &mut impl Rng,
    ) -> Result<Vec<SeedReport>, SeedError> {
        let cities = names
            .iter()
            .map(|name| City::lookup(name).ok_or_else(|| SeedError::UnknownCity(name.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        self.seed_cities(&cities, rng).await
    }

    pub async fn seed_cities(
        &self,
        cities: &[City],
        rng: &mut impl Rng,
    ) -> Result<Vec<SeedReport>, SeedError> {
        let mut reports = Vec::with_capacity(cities.len());
        for city in cities {
            reports.push(self.seed_city(city, rng).await?);
        }

        let total: usize = reports.iter().map(|r| r.inserted).sum();
        info!("Seeded {total} routes across {} cities", reports.len());
        Ok(reports)
    }

    pub async fn seed_city(&self, city: &City, rng: &mut impl Rng) -> Result<SeedReport, SeedError> {
        if self.config.batch_size == 0 {
            return Err(SeedError::InvalidBatchSize);
        }

        let params = self.config.params_for(city);
        info!("Seeding {} routes around {}...", params.count, city.name);

        let generator = if self.config.offline {
            None
        } else {
            self.generator.as_ref()
        };
        let routes = racing::generate(generator, &params, rng).await?;

        if routes.len() < params.count {
            warn!(
                "Only {}/{} routes could be generated around {}",
                routes.len(),
                params.count,
                city.name
            );
        }

        let mut inserted = 0;
        for chunk in routes.chunks(self.config.batch_size) {
            inserted += self.backend.insert_routes(self.owner, chunk).await?;
        }

        info!("Seeded {inserted} routes around {}", city.name);
        Ok(SeedReport {
            city: city.name,
            requested: params.count,
            inserted,
        })
    }
}
