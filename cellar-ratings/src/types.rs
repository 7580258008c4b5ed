//! Core types shared by the rating resolution pipeline
//!
//! Data flows through the pipeline in this order:
//! - **Wine** (caller-owned identity, immutable for one resolution)
//! - **RatingCandidate** (raw output of a tier provider, annotated by validation)
//! - **NormalizedRating** (candidate + canonical 0-100 score, ready to persist)
//! - **AggregateIndices** (wine-level summary derived from all stored ratings)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a row in the `wines` table
pub type WineId = i64;

// ============================================================================
// Wine Identity
// ============================================================================

/// Wine colour as recorded in the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WineColour {
    Red,
    White,
    Rose,
    Sparkling,
    Dessert,
    Fortified,
}

impl WineColour {
    /// Lenient parse of free-text colour values
    ///
    /// Unknown values default to white, matching how the inventory import
    /// treats unlabelled bottles.
    pub fn parse(raw: &str) -> Self {
        let colour = raw.trim().to_lowercase();
        match colour.as_str() {
            "red" => Self::Red,
            "white" => Self::White,
            "rose" | "rosé" | "rosado" | "rosato" => Self::Rose,
            "dessert" | "sweet" => Self::Dessert,
            "fortified" | "port" | "sherry" => Self::Fortified,
            _ if colour.contains("sparkl")
                || colour.contains("prosecco")
                || colour.contains("champagne") =>
            {
                Self::Sparkling
            }
            _ => Self::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::White => "white",
            Self::Rose => "rose",
            Self::Sparkling => "sparkling",
            Self::Dessert => "dessert",
            Self::Fortified => "fortified",
        }
    }
}

impl fmt::Display for WineColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wine identity supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wine {
    pub id: WineId,
    pub name: String,
    pub producer: Option<String>,
    /// `None` for non-vintage wines
    pub vintage: Option<i32>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub colour: WineColour,
    /// Free-text style label from the inventory (e.g. "Barolo", "Brut NV")
    pub style: Option<String>,
}

impl Wine {
    /// Minimal constructor; remaining identity fields default to empty
    pub fn new(id: WineId, name: impl Into<String>, vintage: Option<i32>) -> Self {
        Self {
            id,
            name: name.into(),
            producer: None,
            vintage,
            country: None,
            region: None,
            colour: WineColour::Red,
            style: None,
        }
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_colour(mut self, colour: WineColour) -> Self {
        self.colour = colour;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

// ============================================================================
// Rating Candidates
// ============================================================================

/// Whether a found rating is for the requested vintage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VintageMatch {
    /// Rating is for the vintage on record
    Exact,
    /// Rating is for a different vintage, assumed representative
    Inferred,
}

impl VintageMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Inferred => "inferred",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "inferred" => Some(Self::Inferred),
            _ => None,
        }
    }
}

/// Rating category aggregated separately before blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingLens {
    Competition,
    Critics,
    Community,
}

impl RatingLens {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Competition => "competition",
            Self::Critics => "critics",
            Self::Community => "community",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "competition" | "competitions" => Some(Self::Competition),
            "critics" | "critic" => Some(Self::Critics),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

/// A rating as returned by a tier provider
///
/// Providers fill the raw fields. The pipeline only ever adds the
/// `identity_score`/`identity_reason` annotations; later tiers never touch a
/// candidate produced by an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCandidate {
    /// Source name as reported by the provider (resolved against the registry later)
    pub source: String,
    /// Scale hint such as "100pt", "20pt", "stars", "medal"
    pub score_type: String,
    /// Score exactly as found; may be a placeholder the normalizer rejects
    pub raw_score: String,
    pub competition_year: Option<i32>,
    /// Medal or award name for competition results
    pub award_name: Option<String>,
    /// Number of community votes behind the score
    pub rating_count: Option<i64>,
    pub source_url: Option<String>,
    pub evidence_excerpt: Option<String>,
    /// Wine label text the provider matched the rating against
    pub matched_wine_label: Option<String>,
    pub vintage_match: Option<VintageMatch>,
    /// Provider's own confidence in the match (0.0-1.0)
    pub match_confidence: Option<f64>,
    /// Set by the identity validator (0.0-1.0)
    pub identity_score: Option<f64>,
    /// Set by the identity validator
    pub identity_reason: Option<String>,
}

impl RatingCandidate {
    pub fn new(
        source: impl Into<String>,
        score_type: impl Into<String>,
        raw_score: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            score_type: score_type.into(),
            raw_score: raw_score.into(),
            competition_year: None,
            award_name: None,
            rating_count: None,
            source_url: None,
            evidence_excerpt: None,
            matched_wine_label: None,
            vintage_match: None,
            match_confidence: None,
            identity_score: None,
            identity_reason: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.matched_wine_label = Some(label.into());
        self
    }

    pub fn with_evidence(mut self, excerpt: impl Into<String>) -> Self {
        self.evidence_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_competition_year(mut self, year: i32) -> Self {
        self.competition_year = Some(year);
        self
    }

    pub fn with_vintage_match(mut self, vintage_match: VintageMatch) -> Self {
        self.vintage_match = Some(vintage_match);
        self
    }

    pub fn with_award(mut self, award: impl Into<String>) -> Self {
        self.award_name = Some(award.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Providers that don't say are treated as claiming an exact match
    pub fn effective_vintage_match(&self) -> VintageMatch {
        self.vintage_match.unwrap_or(VintageMatch::Exact)
    }

    /// Text the identity validator matches against: label first, then evidence
    pub fn identity_text(&self) -> Option<&str> {
        self.matched_wine_label
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.evidence_excerpt
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
            })
    }
}

// ============================================================================
// Normalized Scores
// ============================================================================

/// Score band on the canonical 0-100 range
///
/// Invariant: `0 <= min <= mid <= max <= 100`, enforced by [`NormalizedScore::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub min: f64,
    pub max: f64,
    pub mid: f64,
}

impl NormalizedScore {
    /// Build a band, returning `None` if the invariant does not hold
    pub fn new(min: f64, mid: f64, max: f64) -> Option<Self> {
        let finite = min.is_finite() && mid.is_finite() && max.is_finite();
        if finite && 0.0 <= min && min <= mid && mid <= max && max <= 100.0 {
            Some(Self { min, max, mid })
        } else {
            None
        }
    }

    /// Band from an inclusive range with the midpoint in the middle
    pub fn range(min: f64, max: f64) -> Option<Self> {
        Self::new(min, (min + max) / 2.0, max)
    }

    /// Degenerate band for an exact score
    pub fn point(value: f64) -> Option<Self> {
        Self::new(value, value, value)
    }
}

/// A candidate that survived validation and normalization
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRating {
    pub candidate: RatingCandidate,
    /// Canonical source key (registry key for known sources, trimmed input otherwise)
    pub source_key: String,
    pub lens: RatingLens,
    pub score: NormalizedScore,
    /// Registry credibility weight used by the aggregator
    pub credibility: f64,
    /// Vintage the rating applies to, when known
    pub rated_vintage: Option<i32>,
}

// ============================================================================
// Tiers & Telemetry
// ============================================================================

/// Waterfall tier, ordered cheapest-and-fastest to slowest-and-most-thorough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
}

impl Tier {
    /// Method tag reported as `used_method` when this tier wins
    pub fn method_tag(self) -> &'static str {
        match self {
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
            Self::Tier3 => "tier3",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_tag())
    }
}

/// Audit record for one tier attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierOutcome {
    pub wine_id: WineId,
    pub tier: Tier,
    pub used_method: String,
    pub success: bool,
    /// Candidates that survived identity and vintage filtering
    pub ratings_found: usize,
    pub latency_ms: u64,
    /// Failure or skip reason, if any
    pub error: Option<String>,
}

// ============================================================================
// Aggregates
// ============================================================================

/// How much the aggregate can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Unrated,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unrated => "unrated",
        }
    }

    /// Unknown or missing values read back as unrated
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unrated,
        }
    }
}

/// Wine-level summary derived from the full rating set
///
/// Always computed from scratch; never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateIndices {
    pub competition_index: Option<f64>,
    pub critics_index: Option<f64>,
    pub community_index: Option<f64>,
    pub purchase_score: Option<f64>,
    pub purchase_stars: Option<f64>,
    pub confidence_level: ConfidenceLevel,
}

impl AggregateIndices {
    pub fn unrated() -> Self {
        Self {
            competition_index: None,
            critics_index: None,
            community_index: None,
            purchase_score: None,
            purchase_stars: None,
            confidence_level: ConfidenceLevel::Unrated,
        }
    }
}
