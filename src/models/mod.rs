use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Age bracket a coloring page is designed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Child,
    Teen,
    Adult,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Child => "child",
            AgeGroup::Teen => "teen",
            AgeGroup::Adult => "adult",
        }
    }
}

impl Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "child" => Ok(AgeGroup::Child),
            "teen" => Ok(AgeGroup::Teen),
            "adult" => Ok(AgeGroup::Adult),
            other => Err(format!("unknown age group: {}", other)),
        }
    }
}

/// Line-art complexity of a coloring page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// A coloring page in the catalog, as returned to the client
///
/// Immutable for the duration of a recommendation call. `download_count` is
/// bumped externally on each successful download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub character_name: String,
    pub keywords: Vec<String>,
    pub difficulty: Difficulty,
    pub age_group: AgeGroup,
    pub download_count: i64,
}

/// Account record, owned by the account subsystem and read-only here
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub age_group: Option<AgeGroup>,
    pub preferences: Option<Preferences>,
}

/// Explicit user-supplied constraints, as opposed to inferred behavioral signal
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub characters: Option<Vec<String>>,
    pub difficulties: Option<Vec<Difficulty>>,
    pub keywords: Option<Vec<String>>,
}

/// Kinds of logged user interaction; only downloads exist today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Download,
}

/// One entry of the append-only download log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub kind: InteractionKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Recommendation request envelope
///
/// `user_id` comes from the session context upstream, not client input.
/// At least one of `user_id`/`age_group` is needed for a personalized
/// result; absence of both falls back to global popularity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendationRequest {
    pub user_id: Option<Uuid>,
    pub age_group: Option<AgeGroup>,
    pub limit: Option<usize>,
    pub exclude_downloaded: bool,
    pub preferences: Option<Preferences>,
}

/// Which candidate generator produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyUsed {
    CollaborativeFiltering,
    ContentBased,
    Hybrid,
    AgeBasedPopularity,
}

impl Display for StrategyUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyUsed::CollaborativeFiltering => "collaborative_filtering",
            StrategyUsed::ContentBased => "content_based",
            StrategyUsed::Hybrid => "hybrid",
            StrategyUsed::AgeBasedPopularity => "age_based_popularity",
        };
        write!(f, "{}", s)
    }
}

/// Recommendation response envelope
///
/// Items are ordered best-first and carry no internal scoring fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub items: Vec<ContentItem>,
    pub strategy_used: StrategyUsed,
    pub confidence: f64,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Candidates produced by the winning generator, before filtering
    pub total_candidates: usize,
    pub processing_time_ms: u64,
}
