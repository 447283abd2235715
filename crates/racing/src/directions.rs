//! Directions service abstraction and a Google Directions REST client.
//!
//! The route generator only ever talks to [`DirectionsService`], so tests and
//! offline tools can swap in their own implementation.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::Coordinate;

const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Directions service returned {0}")]
    Status(DirectionsStatus),
    #[error("Malformed directions response: {0}")]
    Malformed(String),
}

/// Status codes reported by the directions service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionsStatus {
    Ok,
    ZeroResults,
    NotFound,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    UnknownError,
}

impl DirectionsStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "OK" => Self::Ok,
            "ZERO_RESULTS" => Self::ZeroResults,
            "NOT_FOUND" => Self::NotFound,
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Self::OverQueryLimit,
            "REQUEST_DENIED" => Self::RequestDenied,
            "INVALID_REQUEST" => Self::InvalidRequest,
            _ => Self::UnknownError,
        }
    }

    /// True when the service answered but there is simply no road path.
    pub fn is_no_route(&self) -> bool {
        matches!(self, Self::ZeroResults | Self::NotFound)
    }
}

impl fmt::Display for DirectionsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::ZeroResults => "ZERO_RESULTS",
            Self::NotFound => "NOT_FOUND",
            Self::OverQueryLimit => "OVER_QUERY_LIMIT",
            Self::RequestDenied => "REQUEST_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Bicycling => "bicycling",
        }
    }

    /// Parses a mode name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Driving, Self::Walking, Self::Bicycling]
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(name))
    }
}

/// A single origin → destination query.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub travel_mode: TravelMode,
    pub avoid_highways: bool,
    pub avoid_tolls: bool,
}

impl DirectionsRequest {
    pub fn driving(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin,
            destination,
            travel_mode: TravelMode::Driving,
            avoid_highways: false,
            avoid_tolls: false,
        }
    }
}

/// First route of a successful directions answer, reduced to what we use.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRoute {
    /// Where the routing network actually starts the first leg.
    pub start_location: Coordinate,
    pub distance_meters: Option<f64>,
    pub duration_secs: Option<f64>,
    pub overview_path: Vec<Coordinate>,
}

#[async_trait]
pub trait DirectionsService: Send + Sync {
    /// Resolves a road route or reports why none is available.
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsRoute, DirectionsError>;
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<ApiRoute>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    #[serde(default)]
    legs: Vec<ApiLeg>,
    overview_polyline: Option<ApiPolyline>,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: Option<ApiValue>,
    duration: Option<ApiValue>,
    start_location: ApiLatLng,
}

#[derive(Debug, Deserialize)]
struct ApiValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ApiLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ApiPolyline {
    points: String,
}

/// Client for the Google Directions web service.
#[derive(Clone)]
pub struct GoogleDirectionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleDirectionsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Points the client at a different endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn query_params(&self, request: &DirectionsRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("origin", format_latlng(request.origin)),
            ("destination", format_latlng(request.destination)),
            ("mode", request.travel_mode.as_str().to_string()),
            ("key", self.api_key.clone()),
        ];

        let avoid: Vec<&str> = [
            (request.avoid_highways, "highways"),
            (request.avoid_tolls, "tolls"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !avoid.is_empty() {
            params.push(("avoid", avoid.join("|")));
        }

        params
    }
}

#[async_trait]
impl DirectionsService for GoogleDirectionsClient {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsRoute, DirectionsError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(request))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DirectionsError::Status(DirectionsStatus::OverQueryLimit));
        }

        let body: DirectionsResponse = response.error_for_status()?.json().await?;
        parse_response(body)
    }
}

fn parse_response(body: DirectionsResponse) -> Result<DirectionsRoute, DirectionsError> {
    let status = DirectionsStatus::parse(&body.status);
    if status != DirectionsStatus::Ok {
        if let Some(message) = &body.error_message {
            tracing::debug!("Directions service error message: {message}");
        }
        return Err(DirectionsError::Status(status));
    }

    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| DirectionsError::Malformed("status OK without routes".to_string()))?;
    let leg = route
        .legs
        .first()
        .ok_or_else(|| DirectionsError::Malformed("route without legs".to_string()))?;

    let overview_path = match &route.overview_polyline {
        Some(encoded) => decode_path(&encoded.points)?,
        None => Vec::new(),
    };

    Ok(DirectionsRoute {
        start_location: Coordinate::new(leg.start_location.lat, leg.start_location.lng),
        distance_meters: leg.distance.as_ref().map(|d| d.value),
        duration_secs: leg.duration.as_ref().map(|d| d.value),
        overview_path,
    })
}

/// Decodes an encoded polyline (precision 5) into coordinates.
pub fn decode_path(encoded: &str) -> Result<Vec<Coordinate>, DirectionsError> {
    let line = polyline::decode_polyline(encoded, 5)
        .map_err(|e| DirectionsError::Malformed(format!("bad polyline: {e}")))?;
    Ok(line.0.into_iter().map(|c| Coordinate::new(c.y, c.x)).collect())
}

fn format_latlng(c: Coordinate) -> String {
    format!("{:.7},{:.7}", c.lat, c.lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str = r#"{
        "status": "OK",
        "routes": [{
            "legs": [{
                "distance": {"text": "3.4 km", "value": 3400},
                "duration": {"text": "9 mins", "value": 540},
                "start_location": {"lat": 38.5001, "lng": -120.2002}
            }],
            "overview_polyline": {"points": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"}
        }]
    }"#;

    #[test]
    fn test_parse_ok_response() {
        let body: DirectionsResponse = serde_json::from_str(OK_BODY).unwrap();
        let route = parse_response(body).unwrap();

        assert_eq!(route.start_location, Coordinate::new(38.5001, -120.2002));
        assert_eq!(route.distance_meters, Some(3400.0));
        assert_eq!(route.duration_secs, Some(540.0));
        assert_eq!(route.overview_path.len(), 3);
        assert!((route.overview_path[0].lat - 38.5).abs() < 1e-9);
        assert!((route.overview_path[0].lng + 120.2).abs() < 1e-9);
        assert!((route.overview_path[2].lat - 43.252).abs() < 1e-9);
    }

    #[test]
    fn test_parse_zero_results() {
        let body: DirectionsResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "routes": []}"#).unwrap();
        match parse_response(body) {
            Err(DirectionsError::Status(status)) => assert!(status.is_no_route()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ok_without_routes_is_malformed() {
        let body: DirectionsResponse = serde_json::from_str(r#"{"status": "OK"}"#).unwrap();
        assert!(matches!(
            parse_response(body),
            Err(DirectionsError::Malformed(_))
        ));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(DirectionsStatus::parse("OK"), DirectionsStatus::Ok);
        assert_eq!(
            DirectionsStatus::parse("OVER_DAILY_LIMIT"),
            DirectionsStatus::OverQueryLimit
        );
        assert_eq!(
            DirectionsStatus::parse("SOMETHING_NEW"),
            DirectionsStatus::UnknownError
        );
    }

    #[test]
    fn test_query_params_include_avoid_flags() {
        let client = GoogleDirectionsClient::new("key");
        let mut request =
            DirectionsRequest::driving(Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0));

        let params = client.query_params(&request);
        assert!(params.iter().all(|(k, _)| *k != "avoid"));

        request.avoid_highways = true;
        request.avoid_tolls = true;
        let params = client.query_params(&request);
        let avoid = params.iter().find(|(k, _)| *k == "avoid").unwrap();
        assert_eq!(avoid.1, "highways|tolls");
    }
}
