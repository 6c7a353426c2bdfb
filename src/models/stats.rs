//! Derived statistics models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::OutcomeKind;

/// Percentage of `wins` over `games`, 0 when there are no games.
pub fn win_rate(wins: u32, games: u32) -> f64 {
    if games == 0 {
        0.0
    } else {
        wins as f64 / games as f64 * 100.0
    }
}

/// Games/wins/losses for one slice of the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinLossRecord {
    /// Every game in the slice, including ones without a readable result
    pub games: u32,

    pub wins: u32,

    pub losses: u32,

    /// wins / games * 100
    pub win_rate: f64,
}

impl WinLossRecord {
    /// Count one game. `won` is `None` when the result is unknown.
    pub fn record(&mut self, won: Option<bool>) {
        self.games += 1;
        match won {
            Some(true) => self.wins += 1,
            Some(false) => self.losses += 1,
            None => {}
        }
    }

    pub fn finalize(&mut self) {
        self.win_rate = win_rate(self.wins, self.games);
    }
}

/// Won/lost split for one way of ending a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSplit {
    pub won: u32,
    pub lost: u32,
}

impl OutcomeSplit {
    fn record(&mut self, won: bool) {
        if won {
            self.won += 1;
        } else {
            self.lost += 1;
        }
    }
}

/// Tally of how decided games ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub resignation: OutcomeSplit,
    pub timeout: OutcomeSplit,
    pub score: OutcomeSplit,
    pub disconnection: OutcomeSplit,
}

impl OutcomeTally {
    /// Unknown outcome kinds are not tallied.
    pub fn record(&mut self, kind: OutcomeKind, won: bool) {
        let split = match kind {
            OutcomeKind::Resignation => &mut self.resignation,
            OutcomeKind::Timeout => &mut self.timeout,
            OutcomeKind::Score => &mut self.score,
            OutcomeKind::Disconnection => &mut self.disconnection,
            OutcomeKind::Unknown => return,
        };
        split.record(won);
    }
}

/// Which side of the rating band an opponent fell in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentBucket {
    Stronger,
    Equal,
    Weaker,
}

/// Histogram of opponents relative to the player's rating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentStrength {
    pub stronger: u32,
    pub equal: u32,
    pub weaker: u32,
}

impl OpponentStrength {
    pub fn record(&mut self, bucket: OpponentBucket) {
        match bucket {
            OpponentBucket::Stronger => self.stronger += 1,
            OpponentBucket::Equal => self.equal += 1,
            OpponentBucket::Weaker => self.weaker += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.stronger + self.equal + self.weaker
    }
}

/// A point on the rating-over-time chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSample {
    /// One-based chronological position of the game
    pub game_number: u32,

    pub rating: f64,

    /// Timestamp of the game as reported upstream
    pub date: Option<String>,
}

/// Full statistics breakdown for one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    /// Number of games considered
    pub total: u32,

    pub wins: u32,

    pub losses: u32,

    /// wins / total * 100
    pub win_rate: f64,

    pub black: WinLossRecord,

    pub white: WinLossRecord,

    pub ranked: WinLossRecord,

    pub unranked: WinLossRecord,

    /// Keyed by `"<width>×<height>"`
    pub board_sizes: BTreeMap<String, WinLossRecord>,

    /// Keyed by time-control system name
    pub time_controls: BTreeMap<String, WinLossRecord>,

    pub opponents: OpponentStrength,

    pub outcomes: OutcomeTally,

    pub rank_progression: Vec<RankSample>,
}
