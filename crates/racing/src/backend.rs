//! Persistence of generated routes and race completions.
//!
//! [`SupabaseClient`] talks to the PostgREST interface of the hosted
//! database. [`MemoryBackend`] keeps everything in process for simulations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{GeneratedRoute, NewRouteRow, RaceTarget, RouteCompletion};

pub const ROUTES_TABLE: &str = "routes";
pub const COMPLETIONS_TABLE: &str = "route_completions";

const RACE_TARGET_COLUMNS: &str = "id,name,start_lat,start_lng,end_lat,end_lng,distance";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Rate limited, try again later")]
    RateLimited,
    #[error("Route not found: {0}")]
    NotFound(Uuid),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Inserts routes owned by `owner`. Returns the number of rows written.
    async fn insert_routes(
        &self,
        owner: Uuid,
        routes: &[GeneratedRoute],
    ) -> Result<usize, BackendError>;

    async fn insert_completion(&self, completion: &RouteCompletion) -> Result<(), BackendError>;

    async fn fetch_race_target(&self, route_id: Uuid) -> Result<RaceTarget, BackendError>;
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Acts as a signed-in user instead of the anonymous key.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn check(resp: Response) -> Result<Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(rejection(status, body))
    }
}

/// Maps a non-success response to an error.
fn rejection(status: StatusCode, body: String) -> BackendError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        BackendError::RateLimited
    } else {
        BackendError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl BackendClient for SupabaseClient {
    async fn insert_routes(
        &self,
        owner: Uuid,
        routes: &[GeneratedRoute],
    ) -> Result<usize, BackendError> {
        if routes.is_empty() {
            return Ok(0);
        }

        let rows: Vec<NewRouteRow<'_>> = routes
            .iter()
            .map(|route| NewRouteRow {
                user_id: owner,
                route,
            })
            .collect();

        debug!("Inserting {} routes for {owner}", rows.len());
        let resp = self
            .authorized(self.client.post(self.table_url(ROUTES_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        Self::check(resp).await?;

        Ok(rows.len())
    }

    async fn insert_completion(&self, completion: &RouteCompletion) -> Result<(), BackendError> {
        let resp = self
            .authorized(self.client.post(self.table_url(COMPLETIONS_TABLE)))
            .header("Prefer", "return=minimal")
            .json(completion)
            .send()
            .await?;
        Self::check(resp).await?;

        info!(
            "Recorded completion of {} by {} in {}s",
            completion.route_id, completion.user_id, completion.completion_time
        );
        Ok(())
    }

    async fn fetch_race_target(&self, route_id: Uuid) -> Result<RaceTarget, BackendError> {
        let id_filter = format!("eq.{route_id}");
        let resp = self
            .authorized(self.client.get(self.table_url(ROUTES_TABLE)))
            .query(&[("select", RACE_TARGET_COLUMNS), ("id", id_filter.as_str())])
            .send()
            .await?;
        let rows: Vec<RaceTarget> = Self::check(resp).await?.json().await?;

        rows.into_iter()
            .next()
            .ok_or(BackendError::NotFound(route_id))
    }
}

/// In-process backend that keeps every write.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    routes: Arc<Mutex<Vec<(Uuid, GeneratedRoute)>>>,
    completions: Arc<Mutex<Vec<RouteCompletion>>>,
    targets: Arc<Mutex<HashMap<Uuid, RaceTarget>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route that [`BackendClient::fetch_race_target`] can return.
    pub fn add_target(&self, target: RaceTarget) {
        if let Ok(mut targets) = self.targets.lock() {
            targets.insert(target.id, target);
        }
    }

    pub fn routes(&self) -> Vec<(Uuid, GeneratedRoute)> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn completions(&self) -> Vec<RouteCompletion> {
        self.completions.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> BackendError {
    BackendError::Unavailable("memory backend lock poisoned".to_string())
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn insert_routes(
        &self,
        owner: Uuid,
        routes: &[GeneratedRoute],
    ) -> Result<usize, BackendError> {
        let mut stored = self.routes.lock().map_err(poisoned)?;
        stored.extend(routes.iter().cloned().map(|route| (owner, route)));
        Ok(routes.len())
    }

    async fn insert_completion(&self, completion: &RouteCompletion) -> Result<(), BackendError> {
        self.completions
            .lock()
            .map_err(poisoned)?
            .push(completion.clone());
        Ok(())
    }

    async fn fetch_race_target(&self, route_id: Uuid) -> Result<RaceTarget, BackendError> {
        self.targets
            .lock()
            .map_err(poisoned)?
            .get(&route_id)
            .cloned()
            .ok_or(BackendError::NotFound(route_id))
    }
}
