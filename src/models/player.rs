//! Player identity model.

use serde::{Deserialize, Serialize};

use super::de;
use super::PlayerId;

/// The canonical player a request is about. Request-scoped, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<PlayerId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// A single rating entry (`{"rating": 1500.0, "deviation": ...}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingEntry {
    #[serde(default, deserialize_with = "de::string_or_number_f64")]
    pub rating: Option<f64>,
}

/// Rating categories keyed by name; only `overall` is consulted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingSet {
    #[serde(default, deserialize_with = "de::lenient")]
    pub overall: Option<RatingEntry>,
}

/// Player object as returned by the search and detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamPlayer {
    pub id: PlayerId,

    #[serde(default)]
    pub username: String,

    /// Flat rating, used by older API versions.
    #[serde(default, deserialize_with = "de::string_or_number_f64")]
    pub rating: Option<f64>,

    #[serde(default)]
    pub ratings: Option<RatingSet>,
}

impl UpstreamPlayer {
    /// Overall rating, preferring the structured form.
    pub fn overall_rating(&self) -> Option<f64> {
        self.ratings
            .as_ref()
            .and_then(|r| r.overall.as_ref())
            .and_then(|o| o.rating)
            .or(self.rating)
    }

    pub fn into_identity(self) -> PlayerIdentity {
        let rating = self.overall_rating();
        PlayerIdentity {
            id: self.id,
            username: self.username,
            rating,
        }
    }
}

/// Envelope of `GET /players?username=`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSearchResponse {
    #[serde(default)]
    pub results: Vec<UpstreamPlayer>,
}
