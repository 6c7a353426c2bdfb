//! Fuzzy username matching.
//!
//! The upstream only offers exact/prefix/substring filters, so near-misses
//! ("shusaku" vs "Shuusaku") are found by gathering a broad candidate pool
//! and ranking it locally.

use std::collections::HashSet;

use serde::Serialize;

use crate::fetch::PlayerSearch;
use crate::models::PlayerIdentity;

pub const EXACT_SCORE: f64 = 100.0;
pub const PREFIX_SCORE: f64 = 90.0;
pub const CONTAINS_SCORE: f64 = 80.0;
pub const CONTAINED_SCORE: f64 = 70.0;
/// Ceiling for candidates that only match by edit distance.
pub const EDIT_SCALE: f64 = 60.0;

/// Queries shorter than this are not additionally broadened by prefix.
const SHORT_PREFIX_LEN: usize = 3;

/// Levenshtein distance over lower-cased characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Score `candidate` against `query` on a 0–100 scale.
pub fn similarity(query: &str, candidate: &str) -> f64 {
    let q = query.trim().to_lowercase();
    let c = candidate.trim().to_lowercase();

    if c == q {
        return EXACT_SCORE;
    }
    if c.starts_with(&q) {
        return PREFIX_SCORE;
    }
    if c.contains(&q) {
        return CONTAINS_SCORE;
    }
    if q.contains(&c) {
        return CONTAINED_SCORE;
    }

    let max_len = q.chars().count().max(c.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let distance = edit_distance(&q, &c);
    let scaled = (max_len as f64 - distance as f64) / max_len as f64 * EDIT_SCALE;
    scaled.max(0.0)
}

/// A ranked match for a search string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub player: PlayerIdentity,
    pub score: f64,
}

impl Candidate {
    pub fn is_exact(&self) -> bool {
        self.score >= EXACT_SCORE
    }
}

/// Deduplicate by lower-cased username (first occurrence wins), score, and
/// keep the best `limit`. Ties are broken by username for stable output.
pub fn rank_candidates(
    query: &str,
    players: impl IntoIterator<Item = PlayerIdentity>,
    limit: usize,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Candidate> = players
        .into_iter()
        .filter(|p| seen.insert(p.username.to_lowercase()))
        .map(|player| Candidate {
            score: similarity(query, &player.username),
            player,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.player.username.cmp(&b.player.username))
    });
    ranked.truncate(limit);
    ranked
}

/// Upstream searches whose union forms the candidate pool.
pub fn broadened_searches(query: &str) -> Vec<PlayerSearch> {
    let query = query.trim();
    let mut searches = vec![
        PlayerSearch::Exact(query.to_string()),
        PlayerSearch::Prefix(query.to_string()),
        PlayerSearch::Contains(query.to_string()),
    ];
    if query.chars().count() > SHORT_PREFIX_LEN {
        let short: String = query.chars().take(SHORT_PREFIX_LEN).collect();
        searches.push(PlayerSearch::Prefix(short));
    }
    searches
}
