//! Types for metadata provider responses.

use serde::{Deserialize, Serialize};

/// A search hit for a catalog code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieCandidate {
    pub id: String,
    pub provider: String,
    pub number: String,
    #[serde(default)]
    pub title: String,
}

impl MovieCandidate {
    /// Whether the candidate's number equals `code`, ignoring case and separators.
    pub fn matches_code(&self, code: &str) -> bool {
        normalize_code(&self.number) == normalize_code(code)
    }
}

/// Full metadata record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub id: String,
    pub provider: String,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub actors: Vec<String>,
    /// Studio.
    #[serde(default)]
    pub maker: String,
    /// Publisher.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Minutes.
    #[serde(default)]
    pub runtime: u32,
    /// `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub score: f32,
    /// Portrait artwork, if the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    /// Landscape cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

impl MovieDetail {
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
