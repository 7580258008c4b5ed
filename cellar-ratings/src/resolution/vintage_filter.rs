//! Vintage Sensitivity Filter
//!
//! Some wines taste much the same year to year (non-vintage sparkling,
//! tawny port, everyday whites) while others vary a lot (Barolo, classed
//! Bordeaux). A rating found for a neighbouring vintage ("inferred") is only
//! kept when the wine's category tolerates it.

use super::identity_validator::RejectedCandidate;
use super::tokens::{extract_years, normalize_phrase};
use crate::types::{RatingCandidate, VintageMatch, Wine, WineColour};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// How much a wine's quality depends on its vintage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VintageSensitivity {
    /// Non-vintage or blended across years; any inferred rating is fine
    Insensitive,
    /// Inferred ratings within `low_max_gap` years are kept
    Low,
    /// Inferred ratings within `medium_max_gap` years are kept
    Medium,
    /// Only exact-vintage ratings are kept
    High,
}

impl fmt::Display for VintageSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Insensitive => "insensitive",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Category lists and year gaps (see `[vintage]` config section)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct VintageConfig {
    /// Name/style phrases marking a wine as vintage-insensitive
    pub insensitive_keywords: Vec<String>,
    /// Regions whose wines vary strongly by vintage
    pub high_sensitivity_regions: Vec<String>,
    /// Name/style phrases marking a wine as vintage-sensitive
    pub high_sensitivity_keywords: Vec<String>,
    pub low_max_gap: i32,
    pub medium_max_gap: i32,
}

impl Default for VintageConfig {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            insensitive_keywords: list(&[
                "nv", "non vintage", "brut", "extra brut", "prosecco", "cava", "tawny", "ruby",
                "sherry", "fino", "manzanilla", "amontillado", "oloroso", "cream", "madeira",
            ]),
            high_sensitivity_regions: list(&[
                "bordeaux", "pauillac", "margaux", "saint emilion", "pomerol", "burgundy",
                "bourgogne", "barolo", "barbaresco", "brunello", "montalcino", "rioja",
                "ribera del duero", "priorat", "hermitage", "cote rotie", "chateauneuf du pape",
                "napa", "sauternes", "tokaji", "mosel",
            ]),
            high_sensitivity_keywords: list(&[
                "grand cru", "premier cru", "1er cru", "gran reserva", "riserva",
                "vintage port", "late harvest", "botrytis", "trockenbeerenauslese",
            ]),
            low_max_gap: 3,
            medium_max_gap: 1,
        }
    }
}

/// Result of filtering one tier's identity-valid candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VintageFilterOutcome {
    pub surviving: Vec<RatingCandidate>,
    pub dropped: Vec<RejectedCandidate>,
}

/// Drops inferred-vintage candidates the wine's category cannot tolerate
#[derive(Debug, Clone, Default)]
pub struct VintageSensitivityFilter {
    config: VintageConfig,
}

impl VintageSensitivityFilter {
    pub fn new(config: VintageConfig) -> Self {
        Self { config }
    }

    /// Classify a wine
    pub fn sensitivity(&self, wine: &Wine) -> VintageSensitivity {
        if wine.vintage.is_none() {
            return VintageSensitivity::Insensitive;
        }

        let text = normalize_phrase(&format!(
            "{} {} {}",
            wine.name,
            wine.style.as_deref().unwrap_or(""),
            wine.region.as_deref().unwrap_or("")
        ));
        let mentions = |phrases: &[String]| {
            phrases
                .iter()
                .any(|p| text.contains(normalize_phrase(p).as_str()))
        };

        let high = mentions(&self.config.high_sensitivity_keywords)
            || mentions(&self.config.high_sensitivity_regions);

        match wine.colour {
            WineColour::Fortified if high => VintageSensitivity::High,
            WineColour::Fortified => VintageSensitivity::Insensitive,
            _ if mentions(&self.config.insensitive_keywords) && !high => {
                VintageSensitivity::Insensitive
            }
            _ if high => VintageSensitivity::High,
            WineColour::Red | WineColour::Dessert | WineColour::Sparkling => VintageSensitivity::Medium,
            WineColour::White | WineColour::Rose => VintageSensitivity::Low,
        }
    }

    /// Keep exact-vintage candidates and the inferred ones the category tolerates
    pub fn filter(&self, wine: &Wine, candidates: Vec<RatingCandidate>) -> VintageFilterOutcome {
        let sensitivity = self.sensitivity(wine);
        let mut outcome = VintageFilterOutcome::default();

        for candidate in candidates {
            match self.drop_reason(wine, sensitivity, &candidate) {
                None => outcome.surviving.push(candidate),
                Some(reason) => {
                    debug!(
                        wine_id = wine.id,
                        source = %candidate.source,
                        sensitivity = %sensitivity,
                        reason = %reason,
                        "Vintage filter dropped candidate"
                    );
                    outcome.dropped.push(RejectedCandidate { candidate, reason });
                }
            }
        }

        outcome
    }

    fn drop_reason(
        &self,
        wine: &Wine,
        sensitivity: VintageSensitivity,
        candidate: &RatingCandidate,
    ) -> Option<String> {
        if candidate.effective_vintage_match() == VintageMatch::Exact {
            return None;
        }

        let gap = match (wine.vintage, rated_vintage(wine, candidate)) {
            (Some(wanted), Some(found)) => Some((found - wanted).abs()),
            _ => None,
        };

        let max_gap = match sensitivity {
            VintageSensitivity::Insensitive => return None,
            VintageSensitivity::Low => self.config.low_max_gap,
            VintageSensitivity::Medium => self.config.medium_max_gap,
            VintageSensitivity::High => {
                return Some(format!(
                    "inferred vintage not accepted for {} sensitivity wine",
                    sensitivity
                ))
            }
        };

        match gap {
            Some(gap) if gap <= max_gap => None,
            Some(gap) => Some(format!(
                "inferred vintage {} years away exceeds {} for {} sensitivity wine",
                gap, max_gap, sensitivity
            )),
            // Low sensitivity tolerates an unknown gap, medium does not
            None if sensitivity == VintageSensitivity::Low => None,
            None => Some(format!(
                "inferred vintage with unknown year for {} sensitivity wine",
                sensitivity
            )),
        }
    }
}

/// Vintage a candidate's rating applies to
///
/// Exact matches rate the wine's own vintage. Inferred matches rate the
/// label year closest to it (a competition year is never taken as a vintage).
pub fn rated_vintage(wine: &Wine, candidate: &RatingCandidate) -> Option<i32> {
    if candidate.effective_vintage_match() == VintageMatch::Exact {
        return wine.vintage;
    }

    let text = candidate.identity_text()?;
    let years = extract_years(text)
        .into_iter()
        .filter(|y| Some(*y) != candidate.competition_year || Some(*y) == wine.vintage);

    match wine.vintage {
        Some(vintage) => years.min_by_key(|y| (y - vintage).abs()),
        None => years.max(),
    }
}
