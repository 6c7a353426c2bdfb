//! Upstream game-server access.
//!
//! [`GameServerApi`] is the seam between the service and the public REST
//! API; [`OgsClient`] is the real implementation and tests substitute an
//! in-memory server. [`history`] walks the paginated game history on top of
//! whichever implementation it is given.

pub mod history;
#[cfg(test)]
pub mod mock;
mod ogs;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::models::{PlayerId, UpstreamPlayer};

pub use history::{fetch_history, GameHistory, HistoryRequest, PaginationPolicy, StopReason};
pub use ogs::OgsClient;

/// Errors that can occur talking to the upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }
}

impl FetchError {
    /// Worth one more attempt: timeouts, dropped connections, 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::InvalidUrl(_) | FetchError::Json(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// How to match a username against the player directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerSearch {
    /// `username=` (case-insensitive exact)
    Exact(String),
    /// `username__istartswith=`
    Prefix(String),
    /// `username__icontains=`
    Contains(String),
}

impl PlayerSearch {
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            PlayerSearch::Exact(q) => ("username", q.as_str()),
            PlayerSearch::Prefix(q) => ("username__istartswith", q.as_str()),
            PlayerSearch::Contains(q) => ("username__icontains", q.as_str()),
        }
    }
}

/// One request against the game-history endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamesPageRequest {
    /// One-based page number
    pub page: u32,
    pub page_size: u32,
    /// Upstream sort key, e.g. `-ended`
    pub ordering: String,
}

/// One page of game history, exactly as the upstream returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GamesPage {
    #[serde(default)]
    pub count: Option<u64>,

    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub previous: Option<String>,

    #[serde(default)]
    pub results: Vec<Value>,
}

/// Read access to the game server's public API.
#[async_trait]
pub trait GameServerApi: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// `GET /players/{id}/`
    async fn player(&self, id: PlayerId) -> Result<UpstreamPlayer, FetchError>;

    /// `GET /players?<filter>=<query>`
    async fn search_players(&self, search: &PlayerSearch)
        -> Result<Vec<UpstreamPlayer>, FetchError>;

    /// `GET /players/{id}/games/?page_size=&page=&ordering=`
    async fn games_page(
        &self,
        id: PlayerId,
        request: &GamesPageRequest,
    ) -> Result<GamesPage, FetchError>;
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// API root, e.g. `https://online-go.com/api/v1`
    pub base_url: Url,

    /// Per-request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(crate::config::DEFAULT_UPSTREAM_URL)
                .expect("default upstream URL is valid"),
            timeout: Duration::from_secs(10),
            user_agent: format!("go-stats/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
