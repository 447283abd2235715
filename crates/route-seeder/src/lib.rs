//! Route seeding and race simulation for Segmentor.
//!
//! Seeds the route catalogue with generated routes around well-known city
//! centers, and produces simulated GPS feeds for racing those routes without a
//! device.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use route_seeder::prelude::*;
//!
//! let seeder = RouteSeeder::new(backend, owner_id)
//!     .with_config(SeedConfig::default().with_routes_per_city(5).offline());
//! let reports = seeder.seed_named(&["London", "Paris"], &mut rng).await?;
//! ```

pub mod config;
pub mod feed;
pub mod seeder;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{City, SeedConfig};
    pub use crate::feed::{FeedError, RaceFeed, replay};
    pub use crate::seeder::{RouteSeeder, SeedError, SeedReport};
}
