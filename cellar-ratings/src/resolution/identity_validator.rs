//! Identity Validator
//!
//! Decides whether a candidate rating refers to the same wine as the one on
//! record, by comparing the candidate's matched label (or evidence excerpt)
//! against the wine's identity tokens.
//!
//! # Scoring
//! ```text
//! score = name_weight * name_overlap
//!       + producer_weight * producer_overlap
//!       + vintage_weight * vintage_component
//!       + region_bonus (if any region token appears)
//! ```
//! When the wine has no producer tokens beyond its name, the producer weight
//! is folded into the name weight. The score is clamped to 0.0-1.0.
//!
//! # Hard rejections
//! Independent of the score, a candidate is rejected when:
//! - there is no label or evidence text to compare against
//! - no name token matches
//! - the wine has producer tokens, none appear, and either the name matched
//!   only partly or the label carries other words (another producer's wine
//!   of the same name)
//! - the label is marked non-vintage but the wine has a vintage
//! - the label names a different year and the provider claims an exact match
//! - the label year is further away than `max_inferred_gap`

use super::tokens::{IdentityTokenSet, LabelTokens};
use crate::types::{RatingCandidate, VintageMatch, Wine};
use serde::Deserialize;
use tracing::debug;

/// Label words that describe style rather than identify a producer
const DESCRIPTOR_WORDS: &[&str] = &[
    "red", "white", "rose", "rouge", "blanc", "tinto", "bianco", "brut", "dry", "sec", "sweet",
    "estate", "bottled", "magnum",
];

/// Identity thresholds (tunable, see `[identity]` config section)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Minimum combined score to accept a candidate
    pub min_score: f64,
    pub name_weight: f64,
    pub producer_weight: f64,
    pub vintage_weight: f64,
    /// Added when a region/country token appears in the label
    pub region_bonus: f64,
    /// `strsim::normalized_levenshtein` floor for a fuzzy token match
    pub fuzzy_similarity: f64,
    /// Tokens shorter than this only match exactly
    pub fuzzy_min_len: usize,
    /// Largest year gap accepted for a candidate flagged as inferred
    pub max_inferred_gap: i32,
    /// Reject candidates with neither matched label nor evidence excerpt;
    /// when false they pass through unverified with score 0.0
    pub require_identity_text: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            min_score: 0.6,
            name_weight: 0.55,
            producer_weight: 0.25,
            vintage_weight: 0.2,
            region_bonus: 0.05,
            fuzzy_similarity: 0.85,
            fuzzy_min_len: 4,
            max_inferred_gap: 10,
            require_identity_text: true,
        }
    }
}

/// A candidate the pipeline declined, with the reason it was declined
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCandidate {
    pub candidate: RatingCandidate,
    pub reason: String,
}

/// Validation split of one tier's candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub accepted: Vec<RatingCandidate>,
    pub rejected: Vec<RejectedCandidate>,
}

/// Result of scoring one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAssessment {
    pub score: f64,
    /// `Some` when the candidate must be rejected
    pub rejection: Option<String>,
    /// Human-readable breakdown of the score
    pub summary: String,
}

impl IdentityAssessment {
    fn reject(score: f64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            score,
            summary: reason.clone(),
            rejection: Some(reason),
        }
    }
}

/// Vintage comparison between label and record
enum VintageComponent {
    Score(f64, &'static str),
    Reject(String),
}

/// Token-overlap identity validator
#[derive(Debug, Clone, Default)]
pub struct IdentityValidator {
    config: IdentityConfig,
}

impl IdentityValidator {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Split candidates into accepted and rejected
    ///
    /// Every candidate leaves with `identity_score` and `identity_reason` set.
    pub fn validate(
        &self,
        wine: &Wine,
        tokens: &IdentityTokenSet,
        candidates: Vec<RatingCandidate>,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for mut candidate in candidates {
            let assessment = self.assess(tokens, &candidate);
            candidate.identity_score = Some(assessment.score);
            candidate.identity_reason = Some(assessment.summary.clone());

            match assessment.rejection {
                Some(reason) => {
                    debug!(
                        wine_id = wine.id,
                        source = %candidate.source,
                        score = assessment.score,
                        reason = %reason,
                        "Identity rejected candidate"
                    );
                    outcome.rejected.push(RejectedCandidate { candidate, reason });
                }
                None => {
                    debug!(
                        wine_id = wine.id,
                        source = %candidate.source,
                        score = assessment.score,
                        "Identity accepted candidate"
                    );
                    outcome.accepted.push(candidate);
                }
            }
        }

        outcome
    }

    /// Score one candidate against the wine's identity tokens
    pub fn assess(&self, tokens: &IdentityTokenSet, candidate: &RatingCandidate) -> IdentityAssessment {
        let Some(text) = candidate.identity_text() else {
            if self.config.require_identity_text {
                return IdentityAssessment::reject(0.0, "no matched label or evidence to verify identity");
            }
            return IdentityAssessment {
                score: 0.0,
                rejection: None,
                summary: "unverified, no identity text".to_string(),
            };
        };

        let mut label = LabelTokens::parse(text);
        // A competition year quoted in the evidence is not the wine's vintage
        if let Some(year) = candidate.competition_year {
            if tokens.vintage != Some(year) {
                label.years.retain(|y| *y != year);
            }
        }

        let name_overlap = self.overlap(tokens.name.iter().map(String::as_str), &label.words);
        if name_overlap == 0.0 {
            return IdentityAssessment::reject(0.0, "no name tokens matched");
        }

        let producer_tokens = tokens.distinct_producer_tokens();
        let producer_overlap = if producer_tokens.is_empty() {
            None
        } else {
            Some(self.overlap(producer_tokens.iter().copied(), &label.words))
        };

        let (vintage_score, vintage_note) = match self.vintage_component(tokens, candidate, &label) {
            VintageComponent::Score(score, note) => (score, note),
            VintageComponent::Reject(reason) => {
                return IdentityAssessment::reject(name_overlap * self.config.name_weight, reason)
            }
        };

        let mut score = match producer_overlap {
            Some(p) => {
                self.config.name_weight * name_overlap
                    + self.config.producer_weight * p
                    + self.config.vintage_weight * vintage_score
            }
            None => {
                (self.config.name_weight + self.config.producer_weight) * name_overlap
                    + self.config.vintage_weight * vintage_score
            }
        };
        let region_hit = tokens.region.iter().any(|r| label.words.contains(r));
        if region_hit {
            score += self.config.region_bonus;
        }
        let score = round2(score.clamp(0.0, 1.0));

        let summary = format!(
            "name {:.2}, producer {}, vintage {}{}",
            name_overlap,
            producer_overlap
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "n/a".to_string()),
            vintage_note,
            if region_hit { ", region match" } else { "" }
        );

        if producer_overlap == Some(0.0) {
            let from_label = candidate
                .matched_wine_label
                .as_deref()
                .is_some_and(|l| !l.trim().is_empty());
            let foreign = if from_label {
                self.foreign_words(tokens, &label.words)
            } else {
                Vec::new()
            };
            if name_overlap < 1.0 || !foreign.is_empty() {
                let detail = if foreign.is_empty() {
                    summary
                } else {
                    format!("{}, unmatched label words: {}", summary, foreign.join(" "))
                };
                return IdentityAssessment::reject(score, format!("producer token mismatch ({})", detail));
            }
        }

        if score < self.config.min_score {
            return IdentityAssessment::reject(
                score,
                format!(
                    "identity score {:.2} below threshold {:.2} ({})",
                    score, self.config.min_score, summary
                ),
            );
        }

        IdentityAssessment {
            score,
            rejection: None,
            summary,
        }
    }

    fn vintage_component(
        &self,
        tokens: &IdentityTokenSet,
        candidate: &RatingCandidate,
        label: &LabelTokens,
    ) -> VintageComponent {
        let Some(vintage) = tokens.vintage else {
            // Non-vintage wine: a dated label may be a vintage release of the same cuvée
            return if label.years.is_empty() {
                VintageComponent::Score(1.0, "nv")
            } else {
                VintageComponent::Score(0.5, "dated label for nv wine")
            };
        };

        if label.years.contains(&vintage) {
            return VintageComponent::Score(1.0, "exact");
        }

        if label.years.is_empty() {
            if label.non_vintage {
                return VintageComponent::Reject(format!(
                    "non-vintage label for a {} vintage wine",
                    vintage
                ));
            }
            return VintageComponent::Score(0.5, "unstated");
        }

        let gap = label
            .years
            .iter()
            .map(|y| (y - vintage).abs())
            .min()
            .unwrap_or(i32::MAX);

        match candidate.effective_vintage_match() {
            VintageMatch::Exact => VintageComponent::Reject(format!(
                "vintage off by {} years with no inference evidence",
                gap
            )),
            VintageMatch::Inferred if gap > self.config.max_inferred_gap => {
                VintageComponent::Reject(format!(
                    "vintage off by {} years, beyond inference window of {}",
                    gap, self.config.max_inferred_gap
                ))
            }
            VintageMatch::Inferred => VintageComponent::Score(0.5, "inferred"),
        }
    }

    /// Label words that are neither the wine's name, region nor a style descriptor
    fn foreign_words<'a>(&self, tokens: &IdentityTokenSet, words: &'a [String]) -> Vec<&'a str> {
        words
            .iter()
            .filter(|w| !DESCRIPTOR_WORDS.contains(&w.as_str()))
            .filter(|w| {
                !tokens
                    .name
                    .iter()
                    .chain(tokens.region.iter())
                    .any(|t| self.token_matches(t, w))
            })
            .map(String::as_str)
            .collect()
    }

    /// Fraction of `wanted` tokens present in `available`, exactly or fuzzily
    fn overlap<'a>(&self, wanted: impl Iterator<Item = &'a str>, available: &[String]) -> f64 {
        let (hits, total) = wanted.fold((0usize, 0usize), |(hits, total), token| {
            let hit = available.iter().any(|candidate| self.token_matches(token, candidate));
            (hits + usize::from(hit), total + 1)
        });

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    fn token_matches(&self, wanted: &str, candidate: &str) -> bool {
        if wanted == candidate {
            return true;
        }
        wanted.chars().count() >= self.config.fuzzy_min_len
            && candidate.chars().count() >= self.config.fuzzy_min_len
            && strsim::normalized_levenshtein(wanted, candidate) >= self.config.fuzzy_similarity
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
