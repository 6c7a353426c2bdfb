//! reqwest-backed client for the Online Go Server REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{FetchError, FetcherConfig, GameServerApi, GamesPage, GamesPageRequest, PlayerSearch};
use crate::models::{PlayerId, PlayerSearchResponse, UpstreamPlayer};

/// HTTP client for the public game-server API.
pub struct OgsClient {
    client: Client,
    config: FetcherConfig,
}

impl OgsClient {
    /// Create a new client with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("go-stats")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Http)?;

        Ok(Self { client, config })
    }

    /// Resolve `path` below the API root. The root is treated as a directory
    /// whether or not it was configured with a trailing slash.
    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", base, path, e)))
    }

    fn search_url(&self, search: &PlayerSearch) -> Result<Url, FetchError> {
        let mut url = self.endpoint("players")?;
        let (key, value) = search.query_pair();
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    fn player_url(&self, id: PlayerId) -> Result<Url, FetchError> {
        self.endpoint(&format!("players/{}/", id))
    }

    fn games_url(&self, id: PlayerId, request: &GamesPageRequest) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&format!("players/{}/games/", id))?;
        url.query_pairs_mut()
            .append_pair("page_size", &request.page_size.to_string())
            .append_pair("page", &request.page.to_string())
            .append_pair("ordering", &request.ordering);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        debug!("GET {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl GameServerApi for OgsClient {
    fn name(&self) -> &'static str {
        "online-go"
    }

    async fn player(&self, id: PlayerId) -> Result<UpstreamPlayer, FetchError> {
        let url = self.player_url(id)?;
        self.get_json(url).await
    }

    async fn search_players(
        &self,
        search: &PlayerSearch,
    ) -> Result<Vec<UpstreamPlayer>, FetchError> {
        let url = self.search_url(search)?;
        let response: PlayerSearchResponse = self.get_json(url).await?;
        Ok(response.results)
    }

    async fn games_page(
        &self,
        id: PlayerId,
        request: &GamesPageRequest,
    ) -> Result<GamesPage, FetchError> {
        let url = self.games_url(id, request)?;
        self.get_json(url).await
    }
}
