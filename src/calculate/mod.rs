//! Statistics calculation engine.
//!
//! Turns a player's raw game history into a [`StatisticsReport`]:
//! - Overall, per-colour and ranked/unranked win rates
//! - Board-size and time-control breakdowns
//! - Opponent strength relative to the player's rating
//! - How games were decided
//! - A sparse rating-progression sample
//!
//! Everything here is pure: no I/O, no clock, inputs are never mutated.

use crate::models::{
    Color, GameRecord, OpponentBucket, PlayerIdentity, RankSample, StatisticsReport,
};

/// Rating difference beyond which an opponent counts as stronger or weaker.
pub const STRENGTH_BAND: f64 = 100.0;

/// Every Nth chronological game is considered for the rating chart.
pub const SAMPLE_INTERVAL: usize = 10;

/// Bucket an opponent by `opponent - player`. The band is inclusive on both
/// ends, so a difference of exactly ±100 is `Equal`.
pub fn classify_opponent(player_rating: f64, opponent_rating: f64) -> OpponentBucket {
    let diff = opponent_rating - player_rating;
    if diff > STRENGTH_BAND {
        OpponentBucket::Stronger
    } else if diff < -STRENGTH_BAND {
        OpponentBucket::Weaker
    } else {
        OpponentBucket::Equal
    }
}

/// Aggregate `games` from the point of view of `player`.
///
/// Games whose result cannot be read count toward `total` and the bucket
/// `games` counters but never toward wins or losses.
pub fn aggregate(player: &PlayerIdentity, games: &[GameRecord]) -> StatisticsReport {
    let mut report = StatisticsReport::default();
    if games.is_empty() {
        return report;
    }

    // Stable sort: games without a timestamp keep their relative order and
    // go first.
    let mut ordered: Vec<&GameRecord> = games.iter().collect();
    ordered.sort_by_key(|g| g.finished_at());

    for (index, game) in ordered.into_iter().enumerate() {
        let color = game.color_of(player.id);
        let won = game.winner().map(|winner| winner == color);

        report.total += 1;
        match won {
            Some(true) => report.wins += 1,
            Some(false) => report.losses += 1,
            None => {}
        }

        if let Some(won) = won {
            report.outcomes.record(game.outcome_kind(), won);
        }

        match color {
            Color::Black => report.black.record(won),
            Color::White => report.white.record(won),
        }

        if game.is_ranked() {
            report.ranked.record(won);
        } else {
            report.unranked.record(won);
        }

        report
            .board_sizes
            .entry(game.board_label())
            .or_default()
            .record(won);
        report
            .time_controls
            .entry(game.time_control_label())
            .or_default()
            .record(won);

        let player_rating = game.historical_rating(color).or(player.rating);
        let opponent_rating = game
            .historical_rating(color.opposite())
            .or_else(|| game.listed_rating(color.opposite()));
        if let (Some(mine), Some(theirs)) = (player_rating, opponent_rating) {
            report.opponents.record(classify_opponent(mine, theirs));
        }

        if index % SAMPLE_INTERVAL == 0 {
            if let Some(rating) = game.historical_rating(color) {
                report.rank_progression.push(RankSample {
                    game_number: index as u32 + 1,
                    rating,
                    date: game.date_label(),
                });
            }
        }
    }

    report.win_rate = crate::models::win_rate(report.wins, report.total);
    report.black.finalize();
    report.white.finalize();
    report.ranked.finalize();
    report.unranked.finalize();
    report.board_sizes.values_mut().for_each(|r| r.finalize());
    report.time_controls.values_mut().for_each(|r| r.finalize());

    report
}
