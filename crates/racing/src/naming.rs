//! Generated route metadata: names, descriptions and tags.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::DifficultyLevel;

pub const ROUTE_PREFIXES: [&str; 15] = [
    "Urban Sprint",
    "City Circuit",
    "Downtown Dash",
    "Metro Loop",
    "Central Run",
    "Riverside Route",
    "Parkland Path",
    "Scenic Circuit",
    "Harbor Loop",
    "Bridge Run",
    "Hill Climb",
    "Valley Sprint",
    "Mountain Circuit",
    "Coastal Path",
    "Forest Loop",
];

pub const ROUTE_SUFFIXES: [&str; 10] = [
    "Challenge",
    "Circuit",
    "Express",
    "Classic",
    "Adventure",
    "Tour",
    "Trail",
    "Path",
    "Route",
    "Loop",
];

pub const THEME_TAGS: [&str; 4] = ["urban", "scenic", "training", "competitive"];

pub const TAG_AUTO_GENERATED: &str = "auto-generated";
pub const TAG_ROAD_ROUTE: &str = "road-route";
pub const TAG_STRAIGHT_LINE: &str = "straight-line";

/// How a route's geometry was produced; decides the second fixed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Road,
    // Offline routes never touch a road network, so they are tagged
    // `straight-line` rather than `road-route`. Every other tag rule is shared.
    StraightLine,
}

impl RouteKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Road => TAG_ROAD_ROUTE,
            Self::StraightLine => TAG_STRAIGHT_LINE,
        }
    }
}

/// `"{prefix} {suffix} {n}"` with n in 1..=99.
pub fn route_name(rng: &mut impl Rng) -> String {
    let prefix = ROUTE_PREFIXES.choose(rng).copied().unwrap_or(ROUTE_PREFIXES[0]);
    let suffix = ROUTE_SUFFIXES.choose(rng).copied().unwrap_or(ROUTE_SUFFIXES[0]);
    let number = rng.gen_range(1..=99);
    format!("{prefix} {suffix} {number}")
}

pub fn route_description(
    distance_km: f64,
    difficulty: DifficultyLevel,
    rng: &mut impl Rng,
) -> String {
    let d = format!("{distance_km:.1}");
    match rng.gen_range(0..5) {
        0 => format!(
            "A {difficulty} {d}km route perfect for testing your speed and endurance on real roads."
        ),
        1 => format!(
            "Experience this {d}km {difficulty} circuit designed for competitive road racing."
        ),
        2 => format!(
            "Challenge yourself on this {d}km {difficulty} route following actual street paths."
        ),
        3 => format!("A carefully crafted {d}km {difficulty} road course for serious racers."),
        _ => format!(
            "Navigate this {d}km {difficulty} route featuring real-world driving challenges."
        ),
    }
}

/// Fixed markers, then difficulty and distance tags, then one random theme.
pub fn route_tags(
    kind: RouteKind,
    difficulty: DifficultyLevel,
    distance_km: f64,
    rng: &mut impl Rng,
) -> Vec<String> {
    let mut tags = vec![TAG_AUTO_GENERATED.to_string(), kind.tag().to_string()];

    match difficulty {
        DifficultyLevel::Easy => tags.push("beginner-friendly".to_string()),
        DifficultyLevel::Hard => tags.push("challenging".to_string()),
        DifficultyLevel::Medium => {}
    }

    if distance_km < 2.0 {
        tags.push("sprint".to_string());
    } else if distance_km > 8.0 {
        tags.push("endurance".to_string());
    }

    if let Some(theme) = THEME_TAGS.choose(rng) {
        tags.push(theme.to_string());
    }

    tags
}
