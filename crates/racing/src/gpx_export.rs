//! GPX export of generated routes.

use std::io::Write;

use geo::Point;
use gpx::errors::GpxError;
use gpx::{Gpx, GpxVersion, Metadata, Track, TrackSegment, Waypoint};
use thiserror::Error;

use crate::models::{Coordinate, GeneratedRoute};

const CREATOR: &str = "segmentor";

#[derive(Debug, Error)]
pub enum GpxExportError {
    #[error("Failed to write GPX: {0}")]
    Write(#[from] GpxError),
}

/// Builds a single-track GPX document following the route's road path, or
/// the straight segment between its endpoints when it has none.
pub fn route_to_gpx(route: &GeneratedRoute) -> Gpx {
    let path: Vec<Coordinate> = match &route.waypoints {
        Some(waypoints) if waypoints.len() >= 2 => waypoints.clone(),
        _ => vec![route.start(), route.end()],
    };

    let mut segment = TrackSegment::new();
    segment.points = path
        .into_iter()
        .map(|c| Waypoint::new(Point::new(c.lng, c.lat)))
        .collect();

    let mut track = Track::new();
    track.name = Some(route.name.clone());
    track.description = Some(route.description.clone());
    track.segments.push(segment);

    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        metadata: Some(Metadata {
            name: Some(route.name.clone()),
            ..Default::default()
        }),
        tracks: vec![track],
        ..Default::default()
    }
}

pub fn write_route_gpx(route: &GeneratedRoute, writer: impl Write) -> Result<(), GpxExportError> {
    gpx::write(&route_to_gpx(route), writer)?;
    Ok(())
}

pub fn route_gpx_bytes(route: &GeneratedRoute) -> Result<Vec<u8>, GpxExportError> {
    let mut buf = Vec::new();
    write_route_gpx(route, &mut buf)?;
    Ok(buf)
}
