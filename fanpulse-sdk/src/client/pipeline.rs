//! Ingestion and query client for the FanPulse HTTP API.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{
    HealthSnapshot, IngestResponse, PlayerStateSnapshot, RawEvent, TeamStateSnapshot,
};

/// Typed HTTP client for the FanPulse server.
#[derive(Debug, Clone)]
pub struct PipelineClient {
    http: Client,
    base_url: Url,
}

impl PipelineClient {
    /// Create a new `PipelineClient` rooted at `base_url`
    /// (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/events` with a single event.
    pub async fn submit(&self, event: &RawEvent) -> Result<IngestResponse, ClientError> {
        let url = self.base_url.join("/api/v1/events")?;
        let resp = self.http.post(url).json(event).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/events` with an array of events.
    pub async fn submit_batch(&self, events: &[RawEvent]) -> Result<IngestResponse, ClientError> {
        let url = self.base_url.join("/api/v1/events")?;
        let resp = self.http.post(url).json(events).send().await?;
        parse_response(resp).await
    }

    /// `GET /metrics` – the latest health snapshot.
    pub async fn metrics(&self) -> Result<HealthSnapshot, ClientError> {
        let url = self.base_url.join("/metrics")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/players/{player_id}`
    pub async fn player(&self, player_id: &str) -> Result<PlayerStateSnapshot, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/players/{}",
            urlencoding::encode(player_id)
        ))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/teams/{team_id}`
    pub async fn team(&self, team_id: &str) -> Result<TeamStateSnapshot, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/teams/{}", urlencoding::encode(team_id)))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}
