//! Paginated game-history collection.
//!
//! Pages are fetched strictly one after another, in page order. The loop
//! stops when the upstream has no next page, when enough games have been
//! collected, or when the wall-clock budget runs out. A transient failure is
//! retried once for the same page; any later-page failure ends collection
//! with what was gathered so far.
//!
//! When the last page is cut short to honour `max_games`, `next` points back
//! at that page so a client following it sees the dropped records.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchError, GameServerApi, GamesPage, GamesPageRequest};
use crate::models::PlayerId;

/// What to collect.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    /// Upper bound on collected games
    pub max_games: usize,
    /// Games requested per upstream page
    pub page_size: u32,
    /// Upstream sort key
    pub ordering: String,
}

/// How patiently to collect it.
#[derive(Debug, Clone)]
pub struct PaginationPolicy {
    /// Wall-clock budget for the whole loop
    pub budget: Duration,
    /// Fixed pause before the single retry of a transient failure
    pub retry_delay: Duration,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(25),
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Why collection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum StopReason {
    /// The upstream reported no further page
    Exhausted,
    /// `max_games` were collected
    TargetReached,
    /// The wall-clock budget ran out
    BudgetExhausted,
    /// A page could not be fetched; earlier pages were kept
    PageFailed { page: u32, error: String },
}

/// Collected history in upstream order.
#[derive(Debug, Clone)]
pub struct GameHistory {
    /// Total games the upstream reports for the player
    pub count: Option<u64>,
    /// Raw game records, at most `max_games`
    pub results: Vec<Value>,
    /// Cursor to the first record not in `results`
    pub next: Option<String>,
    /// Cursor before the first fetched page
    pub previous: Option<String>,
    pub pages_fetched: u32,
    /// The last page held more games than were kept
    pub truncated: bool,
    pub stop_reason: StopReason,
}

impl GameHistory {
    fn empty() -> Self {
        Self {
            count: None,
            results: Vec::new(),
            next: None,
            previous: None,
            pages_fetched: 0,
            truncated: false,
            stop_reason: StopReason::Exhausted,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(
            self.stop_reason,
            StopReason::BudgetExhausted | StopReason::PageFailed { .. }
        )
    }
}

/// Rewrite a pagination link so it addresses `page` instead.
fn link_to_page(link: &str, page: u32) -> Option<String> {
    let mut url = Url::parse(link).ok()?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());
    Some(url.to_string())
}

/// Fetch one page, retrying a transient failure once with the same cursor.
async fn fetch_page(
    api: &dyn GameServerApi,
    player: PlayerId,
    request: &GamesPageRequest,
    retry_delay: Duration,
) -> Result<GamesPage, FetchError> {
    match api.games_page(player, request).await {
        Err(e) if e.is_transient() => {
            warn!(
                "Page {} for player {} failed ({}), retrying in {:?}",
                request.page, player, e, retry_delay
            );
            tokio::time::sleep(retry_delay).await;
            api.games_page(player, request).await
        }
        other => other,
    }
}

/// Collect up to `request.max_games` games for `player`.
///
/// Only a failure of the first page is an error; there is nothing to fall
/// back on at that point.
pub async fn fetch_history(
    api: &dyn GameServerApi,
    player: PlayerId,
    request: &HistoryRequest,
    policy: &PaginationPolicy,
) -> Result<GameHistory, FetchError> {
    let started = Instant::now();
    let mut history = GameHistory::empty();
    let mut page = 1u32;

    loop {
        if history.results.len() >= request.max_games {
            history.stop_reason = StopReason::TargetReached;
            break;
        }
        if page > 1 && started.elapsed() >= policy.budget {
            warn!(
                "Fetch budget of {:?} spent after {} pages for player {}",
                policy.budget, history.pages_fetched, player
            );
            history.stop_reason = StopReason::BudgetExhausted;
            break;
        }

        let page_request = GamesPageRequest {
            page,
            page_size: request.page_size,
            ordering: request.ordering.clone(),
        };
        let body = match fetch_page(api, player, &page_request, policy.retry_delay).await {
            Ok(body) => body,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!(
                    "Stopping at page {} for player {}: {}; keeping {} games",
                    page,
                    player,
                    e,
                    history.results.len()
                );
                history.stop_reason = StopReason::PageFailed {
                    page,
                    error: e.to_string(),
                };
                break;
            }
        };

        history.pages_fetched += 1;
        if page == 1 {
            history.count = body.count;
            history.previous = body.previous.clone();
        }
        let has_next = body.next.is_some();
        let received = body.results.len();
        let remaining = request.max_games - history.results.len();
        if received > remaining {
            // Resume from this page; the cursor to the following one would
            // skip the records dropped below.
            history.truncated = true;
            history.next = body
                .next
                .as_deref()
                .or(body.previous.as_deref())
                .and_then(|link| link_to_page(link, page));
        } else {
            history.next = body.next;
        }
        history
            .results
            .extend(body.results.into_iter().take(remaining));
        debug!(
            "Page {} for player {}: {} games, {} collected",
            page,
            player,
            received,
            history.results.len()
        );

        if !has_next || received == 0 {
            history.stop_reason = StopReason::Exhausted;
            break;
        }
        page += 1;
    }

    info!(
        "Collected {} games for player {} from {} pages via {} ({:?})",
        history.results.len(),
        player,
        history.pages_fetched,
        api.name(),
        history.stop_reason
    );
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{Failure, MockGameServer};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn games(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i})).collect()
    }

    fn request(max_games: usize, page_size: u32) -> HistoryRequest {
        HistoryRequest {
            max_games,
            page_size,
            ordering: "-ended".to_string(),
        }
    }

    fn fast_policy() -> PaginationPolicy {
        PaginationPolicy {
            budget: Duration::from_secs(30),
            retry_delay: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn test_target_spanning_partial_last_page() {
        let api = MockGameServer::new().with_games(games(1000));
        let history = fetch_history(&api, PlayerId::new(1), &request(250, 100), &fast_policy())
            .await
            .unwrap();

        assert_eq!(api.page_request_count(), 3);
        assert_eq!(api.requested_pages(), vec![1, 2, 3]);
        assert_eq!(history.results.len(), 250);
        assert_eq!(history.results[249]["id"], 249);
        assert_eq!(history.pages_fetched, 3);
        assert_eq!(history.count, Some(1000));
        assert!(history.truncated);
        assert_eq!(
            history.next.as_deref(),
            Some("https://mock.test/players/1/games/?page_size=100&page=3")
        );
        assert_eq!(history.stop_reason, StopReason::TargetReached);
        assert!(!history.is_partial());
    }

    #[tokio::test]
    async fn test_target_on_page_boundary_keeps_next_page() {
        let api = MockGameServer::new().with_games(games(1000));
        let history = fetch_history(&api, PlayerId::new(1), &request(200, 100), &fast_policy())
            .await
            .unwrap();

        assert_eq!(api.requested_pages(), vec![1, 2]);
        assert_eq!(history.results.len(), 200);
        assert!(!history.truncated);
        assert_eq!(
            history.next.as_deref(),
            Some("https://mock.test/players/1/games/?page_size=100&page=3")
        );
        assert_eq!(history.stop_reason, StopReason::TargetReached);
    }

    #[tokio::test]
    async fn test_truncated_final_page_points_back_at_itself() {
        let api = MockGameServer::new().with_games(games(130));
        let history = fetch_history(&api, PlayerId::new(1), &request(120, 50), &fast_policy())
            .await
            .unwrap();

        assert_eq!(history.results.len(), 120);
        assert!(history.truncated);
        assert_eq!(
            history.next.as_deref(),
            Some("https://mock.test/players/1/games/?page_size=50&page=3")
        );
        assert_eq!(history.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn test_link_to_page_replaces_only_page() {
        assert_eq!(
            link_to_page("https://h.test/g/?page=4&ordering=-ended&page_size=10", 3).as_deref(),
            Some("https://h.test/g/?ordering=-ended&page_size=10&page=3")
        );
        assert_eq!(
            link_to_page("https://h.test/g/?page_size=10", 1).as_deref(),
            Some("https://h.test/g/?page_size=10&page=1")
        );
        assert_eq!(link_to_page("not a url", 2), None);
    }

    #[tokio::test]
    async fn test_stops_when_upstream_exhausted() {
        let api = MockGameServer::new().with_games(games(130));
        let history = fetch_history(&api, PlayerId::new(1), &request(10_000, 50), &fast_policy())
            .await
            .unwrap();

        assert_eq!(api.page_request_count(), 3);
        assert_eq!(history.results.len(), 130);
        assert!(history.next.is_none());
        assert!(history.previous.is_none());
        assert_eq!(history.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_preserves_upstream_order() {
        let api = MockGameServer::new().with_games(games(7));
        let history = fetch_history(&api, PlayerId::new(1), &request(100, 3), &fast_policy())
            .await
            .unwrap();

        let ids: Vec<i64> = history
            .results
            .iter()
            .map(|g| g["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_same_page() {
        let api = MockGameServer::new()
            .with_games(games(250))
            .fail_page(2, &[Failure::Status(503)]);
        let history = fetch_history(&api, PlayerId::new(1), &request(10_000, 100), &fast_policy())
            .await
            .unwrap();

        assert_eq!(api.requested_pages(), vec![1, 2, 2, 3]);
        assert_eq!(history.results.len(), 250);
        assert_eq!(history.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_second_transient_failure_keeps_partial_results() {
        let api = MockGameServer::new()
            .with_games(games(250))
            .fail_page(2, &[Failure::Timeout, Failure::Timeout]);
        let history = fetch_history(&api, PlayerId::new(1), &request(10_000, 100), &fast_policy())
            .await
            .unwrap();

        assert_eq!(api.requested_pages(), vec![1, 2, 2]);
        assert_eq!(history.results.len(), 100);
        assert!(history.is_partial());
        assert!(matches!(
            history.stop_reason,
            StopReason::PageFailed { page: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let api = MockGameServer::new()
            .with_games(games(250))
            .fail_page(3, &[Failure::Status(429)]);
        let history = fetch_history(&api, PlayerId::new(1), &request(10_000, 100), &fast_policy())
            .await;

        let history = assert_ok!(history);
        assert_eq!(api.requested_pages(), vec![1, 2, 3]);
        assert_eq!(history.results.len(), 200);
        assert!(history.is_partial());
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let api = MockGameServer::new()
            .with_games(games(10))
            .fail_page(1, &[Failure::Timeout, Failure::Timeout]);
        let result =
            fetch_history(&api, PlayerId::new(1), &request(100, 100), &fast_policy()).await;

        let err = assert_err!(result);
        assert!(err.is_timeout());
        assert_eq!(api.page_request_count(), 2);
    }

    #[tokio::test]
    async fn test_spent_budget_stops_after_first_page() {
        let api = MockGameServer::new().with_games(games(500));
        let policy = PaginationPolicy {
            budget: Duration::ZERO,
            retry_delay: Duration::ZERO,
        };
        let history = fetch_history(&api, PlayerId::new(1), &request(10_000, 100), &policy)
            .await
            .unwrap();

        assert_eq!(api.page_request_count(), 1);
        assert_eq!(history.results.len(), 100);
        assert_eq!(history.stop_reason, StopReason::BudgetExhausted);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let api = MockGameServer::new();
        let history = fetch_history(&api, PlayerId::new(1), &request(100, 100), &fast_policy())
            .await
            .unwrap();

        assert!(history.results.is_empty());
        assert_eq!(history.count, Some(0));
        assert_eq!(history.pages_fetched, 1);
    }

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_value(StopReason::PageFailed {
            page: 4,
            error: "HTTP 500".to_string(),
        })
        .unwrap();
        assert_eq!(json["reason"], "page_failed");
        assert_eq!(json["page"], 4);

        let json = serde_json::to_value(StopReason::TargetReached).unwrap();
        assert_eq!(json, json!({"reason": "target_reached"}));
    }
}
