//! Identity resolution.
//!
//! Maps a username or numeric id to exactly one [`PlayerIdentity`], or, when
//! fuzzy matching is enabled and no exact match exists, to a ranked list of
//! candidates for the caller to choose from.

pub mod fuzzy;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, GameServerApi, PlayerSearch};
use crate::models::{PlayerId, PlayerIdentity, UpstreamPlayer};

pub use fuzzy::{broadened_searches, edit_distance, rank_candidates, similarity, Candidate};

/// Errors that can occur during resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Player not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerLookup {
    ById(PlayerId),
    ByUsername { username: String, fuzzy: bool },
}

impl PlayerLookup {
    /// Build a lookup from request inputs. An explicit id wins over a
    /// username; a blank username counts as absent.
    pub fn from_inputs(
        username: Option<&str>,
        player_id: Option<PlayerId>,
        fuzzy: bool,
    ) -> Result<Self, ResolveError> {
        if let Some(id) = player_id {
            return Ok(PlayerLookup::ById(id));
        }
        match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(username) => Ok(PlayerLookup::ByUsername {
                username: username.to_string(),
                fuzzy,
            }),
            None => Err(ResolveError::InvalidInput(
                "Either username or playerId is required".to_string(),
            )),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Single(PlayerIdentity),
    Ambiguous {
        query: String,
        candidates: Vec<Candidate>,
    },
}

/// Resolves lookups against an upstream API.
pub struct Resolver<'a> {
    api: &'a dyn GameServerApi,
    max_candidates: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(api: &'a dyn GameServerApi, max_candidates: usize) -> Self {
        Self {
            api,
            max_candidates,
        }
    }

    pub async fn resolve(&self, lookup: &PlayerLookup) -> Result<Resolution, ResolveError> {
        let resolution = match lookup {
            PlayerLookup::ById(id) => self.by_id(*id).await.map(Resolution::Single)?,
            PlayerLookup::ByUsername { username, fuzzy } => {
                self.by_username(username, *fuzzy).await?
            }
        };

        match &resolution {
            Resolution::Single(p) => info!("Resolved player {} ({})", p.username, p.id),
            Resolution::Ambiguous { query, candidates } => info!(
                "No exact match for {:?}, offering {} candidates",
                query,
                candidates.len()
            ),
        }
        Ok(resolution)
    }

    async fn by_id(&self, id: PlayerId) -> Result<PlayerIdentity, ResolveError> {
        match self.api.player(id).await {
            Ok(player) => Ok(player.into_identity()),
            Err(e) if e.is_not_found() => Err(ResolveError::NotFound(format!("id {}", id))),
            Err(e) => Err(e.into()),
        }
    }

    async fn by_username(&self, username: &str, fuzzy: bool) -> Result<Resolution, ResolveError> {
        let exact = self
            .api
            .search_players(&PlayerSearch::Exact(username.to_string()))
            .await?;

        let wanted = username.to_lowercase();
        if let Some(player) = exact.iter().find(|p| p.username.to_lowercase() == wanted) {
            return Ok(Resolution::Single(player.clone().into_identity()));
        }
        if !fuzzy {
            return Err(ResolveError::NotFound(username.to_string()));
        }

        let pool = self.broadened_pool(username, exact).await;
        let mut candidates = rank_candidates(
            username,
            pool.into_iter().map(UpstreamPlayer::into_identity),
            self.max_candidates,
        );

        let top_is_exact = match candidates.first() {
            None => return Err(ResolveError::NotFound(username.to_string())),
            Some(top) => top.is_exact(),
        };
        if top_is_exact {
            return Ok(Resolution::Single(candidates.swap_remove(0).player));
        }
        Ok(Resolution::Ambiguous {
            query: username.to_string(),
            candidates,
        })
    }

    /// Ranked candidates for `query` without picking one.
    pub async fn search(&self, query: &str) -> Result<Vec<Candidate>, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::InvalidInput(
                "Search query must not be empty".to_string(),
            ));
        }
        let exact = self
            .api
            .search_players(&PlayerSearch::Exact(query.to_string()))
            .await?;
        let pool = self.broadened_pool(query, exact).await;
        Ok(rank_candidates(
            query,
            pool.into_iter().map(UpstreamPlayer::into_identity),
            self.max_candidates,
        ))
    }

    /// Union of `exact` with every broadened search. Broadened searches are
    /// best-effort: a failing one is logged and skipped.
    async fn broadened_pool(&self, query: &str, exact: Vec<UpstreamPlayer>) -> Vec<UpstreamPlayer> {
        let mut pool = exact;
        for search in broadened_searches(query) {
            if matches!(search, PlayerSearch::Exact(_)) {
                continue;
            }
            match self.api.search_players(&search).await {
                Ok(found) => {
                    debug!("{:?} returned {} players", search, found.len());
                    pool.extend(found);
                }
                Err(e) => warn!("Candidate search {:?} failed: {}", search, e),
            }
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{Failure, MockGameServer};

    fn directory() -> MockGameServer {
        MockGameServer::new()
            .with_player(1, "Shusaku", Some(2100.0))
            .with_player(2, "shusaku_fan", None)
            .with_player(3, "honinbo_shusaku", Some(1900.0))
            .with_player(4, "dosaku", None)
    }

    #[test]
    fn test_lookup_prefers_id() {
        let lookup = PlayerLookup::from_inputs(Some("Shusaku"), Some(PlayerId::new(9)), false);
        assert_eq!(lookup.unwrap(), PlayerLookup::ById(PlayerId::new(9)));
    }

    #[test]
    fn test_lookup_requires_input() {
        assert!(matches!(
            PlayerLookup::from_inputs(None, None, false),
            Err(ResolveError::InvalidInput(_))
        ));
        assert!(matches!(
            PlayerLookup::from_inputs(Some("   "), None, true),
            Err(ResolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_lookup_trims_username() {
        let lookup = PlayerLookup::from_inputs(Some("  sai "), None, true).unwrap();
        assert_eq!(
            lookup,
            PlayerLookup::ByUsername {
                username: "sai".to_string(),
                fuzzy: true
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let resolution = resolver
            .resolve(&PlayerLookup::ById(PlayerId::new(3)))
            .await
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Single(PlayerIdentity::new(3, "honinbo_shusaku").with_rating(1900.0))
        );
    }

    #[tokio::test]
    async fn test_resolve_by_id_not_found() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let err = resolver
            .resolve(&PlayerLookup::ById(PlayerId::new(404)))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_by_id_upstream_failure() {
        let api = directory().fail_player_lookup(Failure::Status(502));
        let resolver = Resolver::new(&api, 10);
        let err = resolver
            .resolve(&PlayerLookup::ById(PlayerId::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Upstream(ref e) if e.status() == Some(502)));
    }

    #[tokio::test]
    async fn test_resolve_exact_username_case_insensitive() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let lookup = PlayerLookup::from_inputs(Some("SHUSAKU"), None, false).unwrap();
        let resolution = resolver.resolve(&lookup).await.unwrap();

        match resolution {
            Resolution::Single(p) => {
                assert_eq!(p.id, PlayerId::new(1));
                assert_eq!(p.rating, Some(2100.0));
            }
            other => panic!("expected single player, got {:?}", other),
        }
        // Exact hit needs no broadened searches.
        assert_eq!(api.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_username_miss_without_fuzzy() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let lookup = PlayerLookup::from_inputs(Some("shusak"), None, false).unwrap();
        let err = resolver.resolve(&lookup).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(ref name) if name == "shusak"));
    }

    #[tokio::test]
    async fn test_resolve_fuzzy_returns_ranked_candidates() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let lookup = PlayerLookup::from_inputs(Some("shusak"), None, true).unwrap();
        let resolution = resolver.resolve(&lookup).await.unwrap();

        let Resolution::Ambiguous { query, candidates } = resolution else {
            panic!("expected candidates");
        };
        assert_eq!(query, "shusak");
        let names: Vec<&str> = candidates.iter().map(|c| c.player.username.as_str()).collect();
        assert_eq!(names, vec!["Shusaku", "shusaku_fan", "honinbo_shusaku"]);
        assert!(candidates.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_resolve_fuzzy_nothing_found() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        let lookup = PlayerLookup::from_inputs(Some("zzzzzz"), None, true).unwrap();
        let err = resolver.resolve(&lookup).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_broadened_search_failure_is_skipped() {
        let api = directory().fail_search(
            PlayerSearch::Contains("shusak".to_string()),
            Failure::Status(500),
        );
        let resolver = Resolver::new(&api, 10);
        let candidates = resolver.search("shusak").await.unwrap();

        // honinbo_shusaku is only reachable through the substring search.
        let names: Vec<&str> = candidates.iter().map(|c| c.player.username.as_str()).collect();
        assert_eq!(names, vec!["Shusaku", "shusaku_fan"]);
    }

    #[tokio::test]
    async fn test_exact_search_failure_propagates() {
        let api = directory().fail_search(
            PlayerSearch::Exact("shusaku".to_string()),
            Failure::Timeout,
        );
        let resolver = Resolver::new(&api, 10);
        let lookup = PlayerLookup::from_inputs(Some("shusaku"), None, true).unwrap();
        let err = resolver.resolve(&lookup).await.unwrap_err();
        assert!(matches!(err, ResolveError::Upstream(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let api = directory();
        let resolver = Resolver::new(&api, 2);
        let candidates = resolver.search("saku").await.unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let api = directory();
        let resolver = Resolver::new(&api, 10);
        assert!(matches!(
            resolver.search("  ").await,
            Err(ResolveError::InvalidInput(_))
        ));
    }
}
