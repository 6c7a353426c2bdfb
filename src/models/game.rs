//! Game record model.
//!
//! Records come straight from the upstream game-history endpoint and are
//! read-only input to the aggregator. Several record shapes are in the wild
//! (flat ids, nested `players` objects, `black_player`/`white_player`), so
//! every field is optional and the accessors below normalise them.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{de, PlayerId, RatingSet};

/// Board side used when a record omits its dimensions.
pub const DEFAULT_BOARD_SIZE: u32 = 19;

/// Label for games whose time control cannot be read.
pub const UNKNOWN_TIME_CONTROL: &str = "Unknown";

static SCORE_MARGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("score margin pattern"));

static SCORE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+(\.\d+)?\s+points?$").expect("score words pattern"));

/// Stone colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// How a game ended, read from the outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Resignation,
    Timeout,
    Score,
    Disconnection,
    Unknown,
}

impl OutcomeKind {
    /// Classify an outcome string.
    ///
    /// Accepts the compact code form (`B+R`, `W+T`, `B+F`, `W+3.5`) and the
    /// word form the live API emits (`Resignation`, `Timeout`,
    /// `Disconnection`, `3.5 points`).
    pub fn classify(outcome: &str) -> Self {
        let outcome = outcome.trim();

        if let Some((_, suffix)) = split_outcome_code(outcome) {
            return match suffix {
                "R" | "r" | "Resign" => OutcomeKind::Resignation,
                "T" | "t" | "Time" => OutcomeKind::Timeout,
                "F" | "f" => OutcomeKind::Disconnection,
                s if SCORE_MARGIN.is_match(s) => OutcomeKind::Score,
                _ => OutcomeKind::Unknown,
            };
        }

        match outcome.to_ascii_lowercase().as_str() {
            "resignation" => OutcomeKind::Resignation,
            "timeout" => OutcomeKind::Timeout,
            "disconnection" => OutcomeKind::Disconnection,
            s if SCORE_WORDS.is_match(s) => OutcomeKind::Score,
            _ => OutcomeKind::Unknown,
        }
    }
}

/// Split `B+R` into `(Black, "R")`. Returns `None` without a colour token.
fn split_outcome_code(outcome: &str) -> Option<(Color, &str)> {
    let (color, rest) = outcome.split_once('+')?;
    let color = match color.trim() {
        "B" | "b" => Color::Black,
        "W" | "w" => Color::White,
        _ => return None,
    };
    Some((color, rest.trim()))
}

/// Player object embedded in a game record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerSummary {
    #[serde(default, deserialize_with = "de::lenient")]
    pub id: Option<i64>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "de::string_or_number_f64")]
    pub rating: Option<f64>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub ratings: Option<RatingSet>,
}

impl PlayerSummary {
    pub fn rating_value(&self) -> Option<f64> {
        self.ratings
            .as_ref()
            .and_then(|r| r.overall.as_ref())
            .and_then(|o| o.rating)
            .or(self.rating)
    }
}

/// A reference to one side of a game: a bare id or a player object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SideRef {
    Id(i64),
    Player(PlayerSummary),
    Other(Value),
}

impl SideRef {
    pub fn id(&self) -> Option<i64> {
        match self {
            SideRef::Id(id) => Some(*id),
            SideRef::Player(p) => p.id,
            SideRef::Other(Value::String(s)) => s.trim().parse().ok(),
            SideRef::Other(_) => None,
        }
    }

    fn rating_value(&self) -> Option<f64> {
        match self {
            SideRef::Player(p) => p.rating_value(),
            _ => None,
        }
    }
}

/// `{ "black": {...}, "white": {...} }` pairs, used for both the `players`
/// object and the `historical_ratings` snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorPair {
    #[serde(default, deserialize_with = "de::lenient")]
    pub black: Option<PlayerSummary>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub white: Option<PlayerSummary>,
}

impl ColorPair {
    pub fn side(&self, color: Color) -> Option<&PlayerSummary> {
        match color {
            Color::Black => self.black.as_ref(),
            Color::White => self.white.as_ref(),
        }
    }
}

/// Time control as a plain system name or a structured object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeControl {
    Name(String),
    Detailed {
        #[serde(default)]
        system: Option<String>,
        #[serde(default)]
        time_control: Option<String>,
    },
    Other(Value),
}

impl TimeControl {
    pub fn system_name(&self) -> Option<&str> {
        let name = match self {
            TimeControl::Name(s) => Some(s.as_str()),
            TimeControl::Detailed {
                system,
                time_control,
            } => system.as_deref().or(time_control.as_deref()),
            TimeControl::Other(_) => None,
        };
        name.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One finished or active match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameRecord {
    #[serde(default, deserialize_with = "de::lenient")]
    pub id: Option<i64>,

    #[serde(default, alias = "blackPlayerId", alias = "black_player_id")]
    pub black: Option<SideRef>,

    #[serde(default, alias = "whitePlayerId", alias = "white_player_id")]
    pub white: Option<SideRef>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub players: Option<ColorPair>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub black_player: Option<PlayerSummary>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub white_player: Option<PlayerSummary>,

    #[serde(default, deserialize_with = "de::lenient")]
    pub outcome: Option<String>,

    #[serde(default, alias = "blackLost", deserialize_with = "de::loose_bool")]
    pub black_lost: Option<bool>,

    #[serde(default, alias = "whiteLost", deserialize_with = "de::loose_bool")]
    pub white_lost: Option<bool>,

    #[serde(default, deserialize_with = "de::loose_bool")]
    pub ranked: Option<bool>,

    #[serde(default, deserialize_with = "de::string_or_number_u32")]
    pub width: Option<u32>,

    #[serde(default, deserialize_with = "de::string_or_number_u32")]
    pub height: Option<u32>,

    #[serde(default, alias = "timeControl")]
    pub time_control: Option<TimeControl>,

    #[serde(default, alias = "startedAt", deserialize_with = "de::lenient")]
    pub started: Option<String>,

    #[serde(default, alias = "endedAt", deserialize_with = "de::lenient")]
    pub ended: Option<String>,

    #[serde(default, alias = "historicalRatings", deserialize_with = "de::lenient")]
    pub historical_ratings: Option<ColorPair>,
}

impl GameRecord {
    /// Build a record from a raw upstream result.
    ///
    /// Fields of an unexpected type are dropped one at a time, so a stray
    /// value never hides the rest of the record. A result that is not an
    /// object at all becomes an empty record, which the aggregator counts
    /// but cannot classify.
    pub fn from_value(value: &Value) -> Self {
        match GameRecord::deserialize(value) {
            Ok(record) => record,
            Err(e) => {
                debug!("Unreadable game record ({}), treating as unknown", e);
                GameRecord::default()
            }
        }
    }

    /// Every black-side id the record carries, in any shape.
    fn black_ids(&self) -> impl Iterator<Item = i64> + '_ {
        let direct = self.black.as_ref().and_then(SideRef::id);
        let nested = self
            .players
            .as_ref()
            .and_then(|p| p.black.as_ref())
            .and_then(|p| p.id);
        let legacy = self.black_player.as_ref().and_then(|p| p.id);
        [direct, nested, legacy].into_iter().flatten()
    }

    /// The colour `player` had in this game. Anything that is not
    /// recognisably black is white.
    pub fn color_of(&self, player: PlayerId) -> Color {
        if self.black_ids().any(|id| id == player.get()) {
            Color::Black
        } else {
            Color::White
        }
    }

    /// The winning colour, if the record says.
    ///
    /// Priority: outcome code colour token, then `black_lost`, then
    /// `white_lost`.
    pub fn winner(&self) -> Option<Color> {
        if let Some((color, _)) = self.outcome.as_deref().and_then(split_outcome_code) {
            return Some(color);
        }
        if let Some(black_lost) = self.black_lost {
            return Some(if black_lost {
                Color::White
            } else {
                Color::Black
            });
        }
        self.white_lost.map(|white_lost| {
            if white_lost {
                Color::Black
            } else {
                Color::White
            }
        })
    }

    pub fn outcome_kind(&self) -> OutcomeKind {
        self.outcome
            .as_deref()
            .map(OutcomeKind::classify)
            .unwrap_or(OutcomeKind::Unknown)
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked.unwrap_or(false)
    }

    /// `"19×19"`-style key; missing dimensions default to 19.
    pub fn board_label(&self) -> String {
        format!(
            "{}×{}",
            self.width.unwrap_or(DEFAULT_BOARD_SIZE),
            self.height.unwrap_or(DEFAULT_BOARD_SIZE)
        )
    }

    pub fn time_control_label(&self) -> String {
        self.time_control
            .as_ref()
            .and_then(TimeControl::system_name)
            .unwrap_or(UNKNOWN_TIME_CONTROL)
            .to_string()
    }

    /// End time, falling back to start time.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.ended
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.started.as_deref().and_then(parse_timestamp))
    }

    /// Raw timestamp text for display, end time first.
    pub fn date_label(&self) -> Option<String> {
        self.ended.clone().or_else(|| self.started.clone())
    }

    /// Rating snapshot taken when the game was played.
    pub fn historical_rating(&self, color: Color) -> Option<f64> {
        self.historical_ratings
            .as_ref()
            .and_then(|h| h.side(color))
            .and_then(PlayerSummary::rating_value)
    }

    /// Rating carried by the embedded player object, if any.
    pub fn listed_rating(&self, color: Color) -> Option<f64> {
        let (direct, legacy) = match color {
            Color::Black => (self.black.as_ref(), self.black_player.as_ref()),
            Color::White => (self.white.as_ref(), self.white_player.as_ref()),
        };
        self.players
            .as_ref()
            .and_then(|p| p.side(color))
            .and_then(PlayerSummary::rating_value)
            .or_else(|| legacy.and_then(PlayerSummary::rating_value))
            .or_else(|| direct.and_then(SideRef::rating_value))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
