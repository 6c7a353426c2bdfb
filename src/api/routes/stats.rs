//! `GET /api/stats`: resolve a player, collect their history, aggregate it.

use std::fmt::Display;
use std::str::FromStr;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::aggregate;
use crate::config::AppConfig;
use crate::fetch::{fetch_history, GameHistory, GameServerApi, HistoryRequest, StopReason};
use crate::models::{GameRecord, PlayerId, PlayerIdentity, StatisticsReport};
use crate::resolve::{Candidate, PlayerLookup, Resolution, Resolver};

/// Raw query parameters. Everything arrives as text so that malformed
/// numbers can be reported as a 400 with a JSON body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub username: Option<String>,
    pub player_id: Option<String>,
    pub page_size: Option<String>,
    pub max_games: Option<String>,
    pub ordering: Option<String>,
    pub fuzzy: Option<String>,
    pub include_statistics: Option<String>,
}

/// A validated stats request.
#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub lookup: PlayerLookup,
    pub history: HistoryRequest,
    pub include_statistics: bool,
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number<T>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    present(raw)
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| ApiError::BadRequest(format!("Invalid {} {:?}: {}", name, s, e)))
        })
        .transpose()
}

fn parse_flag(name: &str, raw: Option<&str>, default: bool) -> Result<bool, ApiError> {
    match present(raw).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Invalid {} {:?}: expected true or false",
            name, other
        ))),
    }
}

impl StatsParams {
    pub fn into_query(self, config: &AppConfig) -> Result<StatsQuery, ApiError> {
        let player_id: Option<PlayerId> = parse_number("playerId", self.player_id.as_deref())?;
        let fuzzy = parse_flag("fuzzy", self.fuzzy.as_deref(), false)?;
        let lookup = PlayerLookup::from_inputs(self.username.as_deref(), player_id, fuzzy)?;

        let page_size = parse_number::<u32>("pageSize", self.page_size.as_deref())?;
        let max_games = parse_number::<usize>("maxGames", self.max_games.as_deref())?;
        let ordering = present(self.ordering.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| config.limits.default_ordering.clone());

        Ok(StatsQuery {
            lookup,
            history: HistoryRequest {
                max_games: config.clamp_max_games(max_games),
                page_size: config.clamp_page_size(page_size),
                ordering,
            },
            include_statistics: parse_flag(
                "includeStatistics",
                self.include_statistics.as_deref(),
                true,
            )?,
        })
    }
}

/// How the history collection went.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSummary {
    pub pages_fetched: u32,
    pub partial: bool,
    /// The last page was cut short to honour `maxGames`
    pub truncated: bool,
    #[serde(flatten)]
    pub stop_reason: StopReason,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamesPayload {
    /// Total games the upstream holds for the player
    pub count: u64,
    /// Records actually carried in `results`
    pub returned: usize,
    /// Upstream records, unmodified and in upstream order
    pub results: Vec<Value>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayerStats {
    pub player: PlayerIdentity,
    pub games: GamesPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticsReport>,
    pub fetch: FetchSummary,
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateList {
    pub success: bool,
    pub multiple_matches: bool,
    pub query: String,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatsResponse {
    Player(Box<PlayerStats>),
    Candidates(CandidateList),
}

impl PlayerStats {
    fn new(
        player: PlayerIdentity,
        history: GameHistory,
        statistics: Option<StatisticsReport>,
    ) -> Self {
        let fetch = FetchSummary {
            pages_fetched: history.pages_fetched,
            partial: history.is_partial(),
            truncated: history.truncated,
            stop_reason: history.stop_reason,
        };
        Self {
            player,
            games: GamesPayload {
                count: history.count.unwrap_or(history.results.len() as u64),
                returned: history.results.len(),
                results: history.results,
                next: history.next,
                previous: history.previous,
            },
            statistics,
            fetch,
            success: true,
        }
    }
}

/// Run one stats request end to end against `api`.
pub async fn compute_stats(
    api: &dyn GameServerApi,
    config: &AppConfig,
    query: StatsQuery,
) -> Result<StatsResponse, ApiError> {
    let resolver = Resolver::new(api, config.limits.max_candidates);
    let player = match resolver.resolve(&query.lookup).await? {
        Resolution::Single(player) => player,
        Resolution::Ambiguous { query, candidates } => {
            return Ok(StatsResponse::Candidates(CandidateList {
                success: true,
                multiple_matches: true,
                query,
                candidates,
            }));
        }
    };

    let history = fetch_history(
        api,
        player.id,
        &query.history,
        &config.pagination_policy(),
    )
    .await?;

    let statistics = query.include_statistics.then(|| {
        let records: Vec<GameRecord> = history.results.iter().map(GameRecord::from_value).collect();
        aggregate(&player, &records)
    });

    Ok(StatsResponse::Player(Box::new(PlayerStats::new(
        player, history, statistics,
    ))))
}

pub async fn player_stats(
    State(state): State<AppState>,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> Result<Json<StatsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params.into_query(&state.config)?;
    let response = compute_stats(state.upstream.as_ref(), &state.config, query).await?;
    Ok(Json(response))
}
