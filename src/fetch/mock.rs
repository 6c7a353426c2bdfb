//! In-memory game server for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{FetchError, GameServerApi, GamesPage, GamesPageRequest, PlayerSearch};
use crate::models::{PlayerId, UpstreamPlayer};

/// A failure the mock should produce instead of a response.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Status(u16),
}

impl Failure {
    fn into_error(self) -> FetchError {
        match self {
            Failure::Timeout => FetchError::Timeout,
            Failure::Status(status) => FetchError::HttpStatus {
                status,
                message: format!("scripted {}", status),
            },
        }
    }
}

/// Serves a fixed player directory and one game history shared by every
/// player id. Records every request it receives.
#[derive(Default)]
pub struct MockGameServer {
    players: Vec<UpstreamPlayer>,
    games: Vec<Value>,
    page_failures: Mutex<HashMap<u32, VecDeque<Failure>>>,
    search_failures: Mutex<HashMap<PlayerSearch, Failure>>,
    player_failure: Option<Failure>,
    pub page_requests: Mutex<Vec<GamesPageRequest>>,
    pub searches: Mutex<Vec<PlayerSearch>>,
}

impl MockGameServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(mut self, id: i64, username: &str, rating: Option<f64>) -> Self {
        self.players.push(UpstreamPlayer {
            id: PlayerId::new(id),
            username: username.to_string(),
            rating,
            ratings: None,
        });
        self
    }

    pub fn with_games(mut self, games: Vec<Value>) -> Self {
        self.games = games;
        self
    }

    /// Queue failures for `page`; each request to it consumes one.
    pub fn fail_page(self, page: u32, failures: &[Failure]) -> Self {
        self.page_failures
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .extend(failures.iter().copied());
        self
    }

    pub fn fail_search(self, search: PlayerSearch, failure: Failure) -> Self {
        self.search_failures.lock().unwrap().insert(search, failure);
        self
    }

    pub fn fail_player_lookup(mut self, failure: Failure) -> Self {
        self.player_failure = Some(failure);
        self
    }

    pub fn page_request_count(&self) -> usize {
        self.page_requests.lock().unwrap().len()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.page)
            .collect()
    }
}

#[async_trait]
impl GameServerApi for MockGameServer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn player(&self, id: PlayerId) -> Result<UpstreamPlayer, FetchError> {
        if let Some(failure) = self.player_failure {
            return Err(failure.into_error());
        }
        self.players
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(FetchError::HttpStatus {
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn search_players(
        &self,
        search: &PlayerSearch,
    ) -> Result<Vec<UpstreamPlayer>, FetchError> {
        self.searches.lock().unwrap().push(search.clone());
        if let Some(failure) = self.search_failures.lock().unwrap().get(search) {
            return Err(failure.into_error());
        }

        let matches = |name: &str| {
            let name = name.to_lowercase();
            match search {
                PlayerSearch::Exact(q) => name == q.to_lowercase(),
                PlayerSearch::Prefix(q) => name.starts_with(&q.to_lowercase()),
                PlayerSearch::Contains(q) => name.contains(&q.to_lowercase()),
            }
        };
        Ok(self
            .players
            .iter()
            .filter(|p| matches(&p.username))
            .cloned()
            .collect())
    }

    async fn games_page(
        &self,
        id: PlayerId,
        request: &GamesPageRequest,
    ) -> Result<GamesPage, FetchError> {
        self.page_requests.lock().unwrap().push(request.clone());

        let scripted = self
            .page_failures
            .lock()
            .unwrap()
            .get_mut(&request.page)
            .and_then(VecDeque::pop_front);
        if let Some(failure) = scripted {
            return Err(failure.into_error());
        }

        let size = request.page_size.max(1) as usize;
        let start = (request.page.saturating_sub(1) as usize) * size;
        let end = (start + size).min(self.games.len());
        let results = self.games.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
        let link = |page: u32| {
            format!(
                "https://mock.test/players/{}/games/?page_size={}&page={}",
                id, request.page_size, page
            )
        };

        Ok(GamesPage {
            count: Some(self.games.len() as u64),
            next: (end < self.games.len()).then(|| link(request.page + 1)),
            previous: (request.page > 1).then(|| link(request.page - 1)),
            results,
        })
    }
}
