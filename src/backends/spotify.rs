// src/backends/spotify.rs

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};
use tracing::{debug, warn};

use super::AudioCatalog;
use crate::config::{AudioConfig, Credentials};
use crate::errors::LookupFailure;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const INITIAL_BACKOFF_MS: u64 = 500;
/// Refresh a little before the token actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Track>,
}

#[derive(Deserialize)]
struct Track {
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

/// Track search against the Spotify Web API using the client-credentials flow.
pub struct SpotifyCatalog {
    client: Client,
    credentials: Credentials,
    market: Option<String>,
    max_retries: u32,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyCatalog {
    pub fn new(credentials: Credentials, config: &AudioConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("building audio catalog HTTP client")?;
        Ok(Self {
            client,
            credentials,
            market: config.market.clone(),
            max_retries: config.max_retries,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, LookupFailure> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("requesting catalog access token");
        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(http_failure)?;
        if !resp.status().is_success() {
            return Err(LookupFailure::Backend(format!(
                "token request rejected: {}",
                resp.status()
            )));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| LookupFailure::Parse(format!("token response: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
        let value = body.access_token.clone();
        *cached = Some(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn search_once(&self, query: &str) -> Result<String, Attempt> {
        let token = self.access_token().await.map_err(Attempt::Fatal)?;
        let mut params = vec![("q", query), ("type", "track"), ("limit", "1")];
        if let Some(market) = self.market.as_deref() {
            params.push(("market", market));
        }

        let resp = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| Attempt::Retry(http_failure(e)))?;

        match resp.status() {
            s if s.is_success() => resp
                .text()
                .await
                .map_err(|e| Attempt::Retry(http_failure(e))),
            StatusCode::UNAUTHORIZED => {
                self.forget_token().await;
                Err(Attempt::Retry(LookupFailure::Backend("access token rejected".into())))
            }
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                Err(Attempt::Retry(LookupFailure::Backend(format!("catalog returned {}", s))))
            }
            s => Err(Attempt::Fatal(LookupFailure::Backend(format!("catalog returned {}", s)))),
        }
    }
}

enum Attempt {
    Retry(LookupFailure),
    Fatal(LookupFailure),
}

#[async_trait]
impl AudioCatalog for SpotifyCatalog {
    async fn search_track(
        &self,
        song: &str,
        album: Option<&str>,
    ) -> Result<Option<String>, LookupFailure> {
        let query = search_query(song, album);
        let mut attempts = 0;
        let body = loop {
            match self.search_once(&query).await {
                Ok(body) => break body,
                Err(Attempt::Retry(e)) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                    warn!(%query, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(Attempt::Retry(e)) | Err(Attempt::Fatal(e)) => return Err(e),
            }
        };
        first_track_url(&body)
    }
}

fn search_query(song: &str, album: Option<&str>) -> String {
    match album {
        Some(album) => format!("track:{} album:{}", song, album),
        None => format!("track:{}", song),
    }
}

/// Share URL of the first item in a search response body.
pub fn first_track_url(body: &str) -> Result<Option<String>, LookupFailure> {
    let resp: SearchResponse = serde_json::from_str(body)
        .map_err(|e| LookupFailure::Parse(format!("search response: {}", e)))?;
    Ok(resp
        .tracks
        .items
        .into_iter()
        .next()
        .and_then(|t| t.external_urls.spotify))
}

fn http_failure(e: reqwest::Error) -> LookupFailure {
    if e.is_timeout() {
        LookupFailure::Timeout(format!("catalog request: {}", e))
    } else {
        LookupFailure::Backend(e.to_string())
    }
}
