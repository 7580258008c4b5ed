//! Deduplication and aggregate index computation
//!
//! `reconcile` collapses duplicate source entries (first occurrence wins).
//! `aggregate` groups ratings by lens, takes a credibility-weighted mean of
//! each lens, and blends the lenses into a purchase score using the user's
//! preference weight.

use crate::types::{AggregateIndices, ConfidenceLevel, NormalizedRating, RatingLens, VintageMatch};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// Lower bound of each half-star band on the purchase score
const STAR_BANDS: &[(f64, f64)] = &[
    (95.0, 5.0),
    (92.0, 4.5),
    (89.0, 4.0),
    (86.0, 3.5),
    (83.0, 3.0),
    (80.0, 2.5),
    (77.0, 2.0),
    (74.0, 1.5),
    (71.0, 1.0),
];

/// Deduplication key: `lowercase(source) + '-' + (competition_year ?? vintage_match ?? 'any')`
pub fn dedup_key(source: &str, competition_year: Option<i32>, vintage_match: Option<VintageMatch>) -> String {
    let qualifier = match (competition_year, vintage_match) {
        (Some(year), _) => year.to_string(),
        (None, Some(vm)) => vm.as_str().to_string(),
        (None, None) => "any".to_string(),
    };
    format!("{}-{}", source.trim().to_lowercase(), qualifier)
}

/// Collapse duplicate source entries; first occurrence wins
///
/// An unset vintage match counts as exact. A later rating that would occupy
/// the same stored slot (source and competition year) is also a duplicate.
pub fn reconcile(ratings: Vec<NormalizedRating>) -> Vec<NormalizedRating> {
    let mut seen = HashSet::new();
    let mut slots = HashSet::new();
    let mut unique = Vec::with_capacity(ratings.len());

    for rating in ratings {
        let key = dedup_key(
            &rating.source_key,
            rating.candidate.competition_year,
            Some(rating.candidate.effective_vintage_match()),
        );
        let slot = (
            rating.source_key.trim().to_lowercase(),
            rating.candidate.competition_year,
        );
        if !seen.insert(key.clone()) {
            debug!(key = %key, raw_score = %rating.candidate.raw_score, "Dropping duplicate rating");
        } else if !slots.insert(slot) {
            debug!(
                key = %key,
                raw_score = %rating.candidate.raw_score,
                "Dropping duplicate rating for an already filled source slot"
            );
        } else {
            unique.push(rating);
        }
    }

    unique
}

/// One rating as seen by the aggregator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingPoint {
    pub lens: RatingLens,
    pub mid: f64,
    pub credibility: f64,
    /// Rating is for a different vintage than the one on record
    pub inferred: bool,
}

impl From<&NormalizedRating> for RatingPoint {
    fn from(rating: &NormalizedRating) -> Self {
        Self {
            lens: rating.lens,
            mid: rating.score.mid,
            credibility: rating.credibility,
            inferred: rating.candidate.effective_vintage_match() == VintageMatch::Inferred,
        }
    }
}

/// Confidence thresholds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Preference weight used when the settings table has none (0 = critics/competitions only, 100 = community only)
    pub default_preference: u8,
    pub high_min_sources: usize,
    /// Max spread (max mid - min mid) still considered agreement for "high"
    pub high_max_spread: f64,
    pub medium_min_sources: usize,
    pub medium_max_spread: f64,
    /// Above this share of inferred-vintage ratings, confidence drops a level
    pub max_inferred_share: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            default_preference: 40,
            high_min_sources: 3,
            high_max_spread: 6.0,
            medium_min_sources: 2,
            medium_max_spread: 10.0,
            max_inferred_share: 0.5,
        }
    }
}

/// Computes [`AggregateIndices`] from a wine's full rating set
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Aggregate all ratings for a wine
    ///
    /// `preference` is clamped to 0-100; higher values favour the community lens
    /// over competition and critics.
    pub fn aggregate(&self, ratings: &[RatingPoint], preference: u8) -> AggregateIndices {
        if ratings.is_empty() {
            return AggregateIndices::unrated();
        }

        let competition_index = lens_index(ratings, RatingLens::Competition);
        let critics_index = lens_index(ratings, RatingLens::Critics);
        let community_index = lens_index(ratings, RatingLens::Community);

        let expert = match (competition_index, critics_index) {
            (Some(a), Some(b)) => Some((a + b) / 2.0),
            (a, b) => a.or(b),
        };

        let community_weight = f64::from(preference.min(100)) / 100.0;
        let purchase_score = match (expert, community_index) {
            (Some(e), Some(c)) => Some((1.0 - community_weight) * e + community_weight * c),
            (e, c) => e.or(c),
        }
        .map(round1);

        AggregateIndices {
            competition_index: competition_index.map(round1),
            critics_index: critics_index.map(round1),
            community_index: community_index.map(round1),
            purchase_stars: purchase_score.map(stars_for),
            purchase_score,
            confidence_level: self.confidence(ratings),
        }
    }

    fn confidence(&self, ratings: &[RatingPoint]) -> ConfidenceLevel {
        let count = ratings.len();
        let (lo, hi) = ratings
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), r| (lo.min(r.mid), hi.max(r.mid)));
        let spread = hi - lo;

        let level = if count >= self.config.high_min_sources && spread <= self.config.high_max_spread {
            ConfidenceLevel::High
        } else if count >= self.config.medium_min_sources && spread <= self.config.medium_max_spread {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        let inferred_share = ratings.iter().filter(|r| r.inferred).count() as f64 / count as f64;
        if inferred_share > self.config.max_inferred_share {
            match level {
                ConfidenceLevel::High => ConfidenceLevel::Medium,
                _ => ConfidenceLevel::Low,
            }
        } else {
            level
        }
    }
}

/// Credibility-weighted mean of one lens
fn lens_index(ratings: &[RatingPoint], lens: RatingLens) -> Option<f64> {
    let (weighted, weight) = ratings
        .iter()
        .filter(|r| r.lens == lens)
        .fold((0.0, 0.0), |(sum, w), r| {
            let credibility = r.credibility.max(0.0);
            (sum + r.mid * credibility, w + credibility)
        });

    (weight > 0.0).then(|| weighted / weight)
}

fn stars_for(score: f64) -> f64 {
    STAR_BANDS
        .iter()
        .find(|(floor, _)| score >= *floor)
        .map(|(_, stars)| *stars)
        .unwrap_or(0.5)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NormalizedScore, RatingCandidate};

    fn point(lens: RatingLens, mid: f64) -> RatingPoint {
        RatingPoint {
            lens,
            mid,
            credibility: 1.0,
            inferred: false,
        }
    }

    fn normalized(source: &str, year: Option<i32>, mid: f64) -> NormalizedRating {
        let mut candidate = RatingCandidate::new(source, "100pt", mid.to_string());
        candidate.competition_year = year;
        NormalizedRating {
            candidate,
            source_key: source.to_string(),
            lens: RatingLens::Competition,
            score: NormalizedScore::point(mid).unwrap(),
            credibility: 1.0,
            rated_vintage: None,
        }
    }

    #[test]
    fn test_dedup_key_format() {
        assert_eq!(dedup_key("IWSC", Some(2020), None), "iwsc-2020");
        assert_eq!(dedup_key("vivino", None, Some(VintageMatch::Inferred)), "vivino-inferred");
        assert_eq!(dedup_key("vivino", None, None), "vivino-any");
    }

    #[test]
    fn test_reconcile_is_case_insensitive_first_wins() {
        let ratings = vec![
            normalized("x", Some(2020), 91.0),
            normalized("X", Some(2020), 85.0),
            normalized("x", Some(2021), 88.0),
        ];

        let unique = reconcile(ratings);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].score.mid, 91.0, "first occurrence must win");
        assert_eq!(unique[1].candidate.competition_year, Some(2021));
    }

    #[test]
    fn test_unset_and_exact_vintage_match_collapse() {
        let mut exact = normalized("vivino", None, 88.0);
        exact.candidate.vintage_match = Some(VintageMatch::Exact);
        let unset = normalized("Vivino", None, 84.0);

        let unique = reconcile(vec![unset, exact]);

        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].score.mid, 84.0);
    }

    #[test]
    fn test_inferred_rating_does_not_take_a_filled_slot() {
        let exact = normalized("vivino", None, 88.0);
        let mut inferred = normalized("vivino", None, 80.0);
        inferred.candidate.vintage_match = Some(VintageMatch::Inferred);
        let other_year = normalized("vivino", Some(2021), 86.0);

        let unique = reconcile(vec![exact, inferred, other_year]);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].score.mid, 88.0);
        assert_eq!(unique[1].candidate.competition_year, Some(2021));
    }

    #[test]
    fn test_empty_ratings_are_unrated() {
        let result = Aggregator::default().aggregate(&[], 40);
        assert_eq!(result, AggregateIndices::unrated());
    }

    #[test]
    fn test_lens_indices_are_credibility_weighted() {
        let ratings = vec![
            RatingPoint { credibility: 1.0, ..point(RatingLens::Critics, 90.0) },
            RatingPoint { credibility: 0.5, ..point(RatingLens::Critics, 96.0) },
        ];
        let result = Aggregator::default().aggregate(&ratings, 0);
        assert_eq!(result.critics_index, Some(92.0));
        assert_eq!(result.competition_index, None);
    }

    #[test]
    fn test_preference_blends_lenses() {
        let ratings = vec![
            point(RatingLens::Critics, 94.0),
            point(RatingLens::Competition, 90.0),
            point(RatingLens::Community, 82.0),
        ];
        let aggregator = Aggregator::default();

        // expert = (90 + 94) / 2 = 92
        assert_eq!(aggregator.aggregate(&ratings, 0).purchase_score, Some(92.0));
        assert_eq!(aggregator.aggregate(&ratings, 100).purchase_score, Some(82.0));
        assert_eq!(aggregator.aggregate(&ratings, 50).purchase_score, Some(87.0));
    }

    #[test]
    fn test_missing_lens_falls_back_to_other_side() {
        let ratings = vec![point(RatingLens::Community, 88.0)];
        let result = Aggregator::default().aggregate(&ratings, 0);
        assert_eq!(result.purchase_score, Some(88.0));
        assert_eq!(result.purchase_stars, Some(3.5));
    }

    #[test]
    fn test_star_bands() {
        assert_eq!(stars_for(97.0), 5.0);
        assert_eq!(stars_for(92.0), 4.5);
        assert_eq!(stars_for(91.9), 4.0);
        assert_eq!(stars_for(60.0), 0.5);
    }

    #[test]
    fn test_confidence_reflects_agreement() {
        let aggregator = Aggregator::default();

        let agreeing = vec![
            point(RatingLens::Critics, 91.0),
            point(RatingLens::Critics, 93.0),
            point(RatingLens::Competition, 92.0),
        ];
        assert_eq!(aggregator.aggregate(&agreeing, 40).confidence_level, ConfidenceLevel::High);

        let disagreeing = vec![
            point(RatingLens::Critics, 80.0),
            point(RatingLens::Critics, 96.0),
            point(RatingLens::Competition, 92.0),
            point(RatingLens::Community, 85.0),
            point(RatingLens::Community, 99.0),
        ];
        assert_eq!(aggregator.aggregate(&disagreeing, 40).confidence_level, ConfidenceLevel::Low);

        let single = vec![point(RatingLens::Critics, 92.0)];
        assert_eq!(aggregator.aggregate(&single, 40).confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_mostly_inferred_ratings_lower_confidence() {
        let inferred = |lens, mid| RatingPoint { inferred: true, ..point(lens, mid) };
        let ratings = vec![
            inferred(RatingLens::Critics, 91.0),
            inferred(RatingLens::Critics, 92.0),
            point(RatingLens::Competition, 92.0),
        ];
        assert_eq!(
            Aggregator::default().aggregate(&ratings, 40).confidence_level,
            ConfidenceLevel::Medium
        );
    }
}
