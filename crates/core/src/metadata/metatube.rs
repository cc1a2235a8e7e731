//! MetaTube-compatible metadata API client.
//!
//! Search: `GET /v1/movies/search?q=<code>`.
//! Detail: `GET /v1/movies/{provider}/{id}`.
//! Both answer `{"data": ...}` and accept an optional bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MetadataError, MetadataProvider, MovieCandidate, MovieDetail};

/// Metadata API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URL of the API server.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u32 {
    30
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// MetaTube API client.
pub struct MetaTubeClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl MetaTubeClient {
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, MetadataError> {
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if status == 404 {
            return Err(MetadataError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            MetadataError::ParseError(format!("Failed to parse {} response: {}", what, e))
        })?;
        Ok(envelope.data)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
    provider: String,
    number: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct MovieInfo {
    id: String,
    provider: String,
    number: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    director: String,
    #[serde(default)]
    actors: Vec<String>,
    #[serde(default)]
    maker: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    series: String,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    runtime: u32,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    thumb_url: String,
    #[serde(default)]
    big_thumb_url: String,
    #[serde(default)]
    cover_url: String,
    #[serde(default)]
    big_cover_url: String,
    #[serde(default)]
    preview_images: Vec<String>,
}

fn first_non_empty(values: [String; 2]) -> Option<String> {
    values.into_iter().find(|v| !v.is_empty())
}

impl From<MovieInfo> for MovieDetail {
    fn from(info: MovieInfo) -> Self {
        // the API reports dates as RFC 3339 timestamps
        let release_date = info
            .release_date
            .get(..10)
            .filter(|d| !d.starts_with("0001"))
            .map(str::to_string);

        MovieDetail {
            id: info.id,
            provider: info.provider,
            number: info.number,
            title: info.title,
            summary: info.summary,
            director: info.director,
            actors: info.actors,
            maker: info.maker,
            label: info.label,
            series: info.series,
            genres: info.genres,
            runtime: info.runtime,
            release_date,
            score: info.score,
            poster_url: first_non_empty([info.big_thumb_url, info.thumb_url]),
            cover_url: first_non_empty([info.big_cover_url, info.cover_url]),
            preview_images: info.preview_images,
        }
    }
}

#[async_trait]
impl MetadataProvider for MetaTubeClient {
    async fn search_by_number(&self, code: &str) -> Result<Vec<MovieCandidate>, MetadataError> {
        debug!(code = %code, "Metadata search");

        let url = format!("{}/v1/movies/search", self.base_url);
        let results: Vec<SearchResult> = self
            .fetch(self.client.get(&url).query(&[("q", code)]), "search")
            .await?;

        Ok(results
            .into_iter()
            .map(|r| MovieCandidate {
                id: r.id,
                provider: r.provider,
                number: r.number,
                title: r.title,
            })
            .collect())
    }

    async fn get_details(&self, provider: &str, id: &str) -> Result<MovieDetail, MetadataError> {
        debug!(provider = %provider, id = %id, "Metadata detail");

        let url = format!(
            "{}/v1/movies/{}/{}",
            self.base_url,
            urlencoding::encode(provider),
            urlencoding::encode(id)
        );
        let info: MovieInfo = self
            .fetch(self.client.get(&url), &format!("{}/{}", provider, id))
            .await?;
        Ok(info.into())
    }
}
