//! Score normalization onto the canonical 0-100 band
//!
//! Each scale has a fixed mapping:
//!
//! | Scale      | Accepted input        | Mapping                    |
//! |------------|-----------------------|----------------------------|
//! | 100pt      | 50-100, or a range    | identity                   |
//! | 20pt       | 0-20, or a range      | `50 + 2.5 * x`             |
//! | stars      | 0-5                   | `50 + 10 * x`              |
//! | medal      | medal name            | banded (gold = 90-94, ...) |
//! | glasses    | 1-3                   | banded                     |
//! | passthrough| 0-100                 | identity                   |
//!
//! Anything else (paywall placeholders, out-of-scale numbers) is a
//! [`NormalizationError`]; callers skip the candidate and carry on.

use crate::error::NormalizationError;
use crate::scoring::sources::{RatingSource, ScoreScale};
use crate::types::{NormalizedRating, NormalizedScore, RatingCandidate};

/// Strings providers return in place of a score
const PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "null", "-", "--", "?", "tbc", "tba", "nr"];

/// Fragments that mark a gated or missing score even if digits are present
const GATED_MARKERS: &[&str] = &["subscribe", "paywall", "login", "log in", "sign in", "members only"];

/// Medal keywords in precedence order (first match wins)
const MEDAL_BANDS: &[(&str, f64, f64)] = &[
    ("trophy", 95.0, 100.0),
    ("platinum", 95.0, 100.0),
    ("double gold", 95.0, 100.0),
    ("grand gold", 95.0, 100.0),
    ("best in show", 95.0, 100.0),
    ("gold", 90.0, 94.0),
    ("silver", 85.0, 89.0),
    ("bronze", 80.0, 84.0),
    ("commended", 75.0, 79.0),
    ("commendation", 75.0, 79.0),
    ("seal", 75.0, 79.0),
];

/// Converts raw scores to [`NormalizedScore`] bands
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreNormalizer;

impl ScoreNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Scale a score is read in: a recognised `score_type` wins over the source default
    pub fn scale_for(source: &RatingSource, score_type: &str) -> ScoreScale {
        ScoreScale::from_score_type(score_type).unwrap_or_else(|| source.default_scale())
    }

    /// Normalize one raw score
    ///
    /// # Errors
    /// `NormalizationError` when `raw` is a placeholder, unparseable, or outside
    /// the scale implied by `score_type`/`source`.
    pub fn normalize(
        &self,
        source: &RatingSource,
        score_type: &str,
        raw: &str,
    ) -> Result<NormalizedScore, NormalizationError> {
        let scale = Self::scale_for(source, score_type);
        let fail = |reason: &str| NormalizationError {
            source_name: source.key().to_string(),
            raw: raw.to_string(),
            scale: scale.as_str(),
            reason: reason.to_string(),
        };

        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return Err(fail("empty score"));
        }
        if PLACEHOLDERS.contains(&text.as_str()) || GATED_MARKERS.iter().any(|m| text.contains(m)) {
            return Err(fail("placeholder instead of a score"));
        }

        let band = match scale {
            ScoreScale::Medal => medal_band(&text).ok_or_else(|| fail("no recognised medal"))?,
            ScoreScale::Glasses3 => glasses_band(&text).ok_or_else(|| fail("expected 1-3 glasses"))?,
            ScoreScale::Points100 => {
                let (lo, hi) = parse_numeric(&text).ok_or_else(|| fail("not a number"))?;
                linear(lo, hi, 50.0, 100.0, |x| x).ok_or_else(|| fail("outside 50-100"))?
            }
            ScoreScale::Points20 => {
                let (lo, hi) = parse_numeric(&text).ok_or_else(|| fail("not a number"))?;
                linear(lo, hi, 0.0, 20.0, |x| 50.0 + 2.5 * x).ok_or_else(|| fail("outside 0-20"))?
            }
            ScoreScale::Stars5 => {
                let (lo, hi) = parse_numeric(&text).ok_or_else(|| fail("not a number"))?;
                linear(lo, hi, 0.0, 5.0, |x| 50.0 + 10.0 * x).ok_or_else(|| fail("outside 0-5"))?
            }
            ScoreScale::PassThrough => {
                let (lo, hi) = parse_numeric(&text).ok_or_else(|| fail("not a number"))?;
                linear(lo, hi, 0.0, 100.0, |x| x).ok_or_else(|| fail("outside 0-100"))?
            }
        };

        Ok(band)
    }

    /// Resolve the source once and normalize a validated candidate
    ///
    /// Competition candidates whose `raw_score` is empty fall back to the
    /// `award_name` (providers often put the medal there).
    pub fn normalize_candidate(
        &self,
        candidate: RatingCandidate,
        rated_vintage: Option<i32>,
    ) -> Result<NormalizedRating, NormalizationError> {
        let source = RatingSource::resolve(&candidate.source);
        let scale = Self::scale_for(&source, &candidate.score_type);

        let score = match self.normalize(&source, &candidate.score_type, &candidate.raw_score) {
            Ok(score) => score,
            Err(err) if scale == ScoreScale::Medal && candidate.raw_score.trim().is_empty() => {
                match candidate.award_name.as_deref() {
                    Some(award) => self.normalize(&source, &candidate.score_type, award)?,
                    None => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        Ok(NormalizedRating {
            source_key: source.key().to_string(),
            lens: source.lens(scale),
            credibility: source.credibility(),
            score,
            rated_vintage,
            candidate,
        })
    }
}

/// Map `[lo, hi]` in `[floor, ceil]` through `f` into a band
fn linear(lo: f64, hi: f64, floor: f64, ceil: f64, f: impl Fn(f64) -> f64) -> Option<NormalizedScore> {
    let in_scale = |x: f64| x >= floor && x <= ceil;
    if !in_scale(lo) || !in_scale(hi) {
        return None;
    }
    let (a, b) = (f(lo).clamp(0.0, 100.0), f(hi).clamp(0.0, 100.0));
    NormalizedScore::range(a.min(b), a.max(b))
}

fn medal_band(text: &str) -> Option<NormalizedScore> {
    MEDAL_BANDS
        .iter()
        .find(|(keyword, _, _)| text.contains(keyword))
        .and_then(|(_, min, max)| NormalizedScore::range(*min, *max))
}

fn glasses_band(text: &str) -> Option<NormalizedScore> {
    let glasses = match parse_numeric(text) {
        Some((n, _)) => n,
        None if text.contains("tre") || text.contains("three") => 3.0,
        None if text.contains("due") || text.contains("two") => 2.0,
        None if text.contains("uno") || text.contains("one") => 1.0,
        None => return None,
    };
    if glasses >= 3.0 - f64::EPSILON && glasses <= 3.0 {
        NormalizedScore::range(95.0, 100.0)
    } else if glasses >= 2.0 && glasses < 3.0 {
        NormalizedScore::range(88.0, 94.0)
    } else if glasses >= 1.0 && glasses < 2.0 {
        NormalizedScore::range(80.0, 87.0)
    } else {
        None
    }
}

/// Extract a score or score range from text
///
/// Handles "92", "92 points", "90-92", "90 to 92", "17.5/20" (denominator
/// ignored), "4,2" (comma decimal). Returns `(low, high)`; equal for a single value.
fn parse_numeric(text: &str) -> Option<(f64, f64)> {
    let mut numbers: Vec<(f64, usize, usize)> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut literal = String::new();
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || ((chars[i] == '.' || chars[i] == ',')
                        && i + 1 < chars.len()
                        && chars[i + 1].is_ascii_digit()))
            {
                literal.push(if chars[i] == ',' { '.' } else { chars[i] });
                i += 1;
            }
            numbers.push((literal.parse().ok()?, start, i));
        } else {
            i += 1;
        }
    }

    let (first, _, first_end) = *numbers.first()?;
    let Some(&(second, second_start, _)) = numbers.get(1) else {
        return Some((first, first));
    };

    let between: String = chars[first_end..second_start].iter().collect();
    match between.trim() {
        "-" | "–" | "—" | "to" => Some((first.min(second), first.max(second))),
        _ => Some((first, first)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::sources::KnownSource;
    use crate::types::RatingLens;

    fn unknown() -> RatingSource {
        RatingSource::resolve("critic_a")
    }

    fn assert_band(score: NormalizedScore, min: f64, mid: f64, max: f64) {
        assert!((score.min - min).abs() < 1e-9, "min {} != {}", score.min, min);
        assert!((score.mid - mid).abs() < 1e-9, "mid {} != {}", score.mid, mid);
        assert!((score.max - max).abs() < 1e-9, "max {} != {}", score.max, max);
    }

    #[test]
    fn test_points_100_single_and_range() {
        let n = ScoreNormalizer::new();
        assert_band(n.normalize(&unknown(), "100pt", "92").unwrap(), 92.0, 92.0, 92.0);
        assert_band(n.normalize(&unknown(), "100pt", "90-92").unwrap(), 90.0, 91.0, 92.0);
        assert_band(n.normalize(&unknown(), "points", "93 to 95 pts").unwrap(), 93.0, 94.0, 95.0);
        assert_band(n.normalize(&unknown(), "100pt", "94/100").unwrap(), 94.0, 94.0, 94.0);
    }

    #[test]
    fn test_points_20_mapping() {
        let n = ScoreNormalizer::new();
        let jancis = RatingSource::Known(KnownSource::JancisRobinson);
        assert_band(n.normalize(&jancis, "", "17").unwrap(), 92.5, 92.5, 92.5);
        assert_band(n.normalize(&jancis, "20pt", "17.5/20").unwrap(), 93.75, 93.75, 93.75);
    }

    #[test]
    fn test_stars_mapping_with_comma_decimal() {
        let n = ScoreNormalizer::new();
        let vivino = RatingSource::Known(KnownSource::Vivino);
        assert_band(n.normalize(&vivino, "", "4,2").unwrap(), 92.0, 92.0, 92.0);
        assert_band(n.normalize(&vivino, "stars", "3.5 stars").unwrap(), 85.0, 85.0, 85.0);
    }

    #[test]
    fn test_medal_bands() {
        let n = ScoreNormalizer::new();
        let dwwa = RatingSource::Known(KnownSource::DecanterWorldWineAwards);
        assert_band(n.normalize(&dwwa, "medal", "Gold").unwrap(), 90.0, 92.0, 94.0);
        assert_band(n.normalize(&dwwa, "medal", "Double Gold").unwrap(), 95.0, 97.5, 100.0);
        assert_band(n.normalize(&dwwa, "", "Silver medal").unwrap(), 85.0, 87.0, 89.0);
        assert!(n.normalize(&dwwa, "medal", "Finalist").is_err());
    }

    #[test]
    fn test_glasses_bands() {
        let n = ScoreNormalizer::new();
        let gambero = RatingSource::Known(KnownSource::GamberoRosso);
        assert_band(n.normalize(&gambero, "", "Tre Bicchieri").unwrap(), 95.0, 97.5, 100.0);
        assert_band(n.normalize(&gambero, "glasses", "2").unwrap(), 88.0, 91.0, 94.0);
        assert!(n.normalize(&gambero, "glasses", "4").is_err());
    }

    #[test]
    fn test_score_type_overrides_source_default() {
        let n = ScoreNormalizer::new();
        let dwwa = RatingSource::Known(KnownSource::DecanterWorldWineAwards);
        assert_band(n.normalize(&dwwa, "100pt", "95").unwrap(), 95.0, 95.0, 95.0);
    }

    #[test]
    fn test_unknown_source_passes_through() {
        let n = ScoreNormalizer::new();
        assert_band(n.normalize(&unknown(), "", "88").unwrap(), 88.0, 88.0, 88.0);
        assert!(n.normalize(&unknown(), "", "140").is_err());
    }

    #[test]
    fn test_malformed_scores_are_errors() {
        let n = ScoreNormalizer::new();
        for raw in ["", "   ", "N/A", "-", "?", "Subscribe to see score", "Login for 90+ ratings", "great wine"] {
            assert!(
                n.normalize(&unknown(), "100pt", raw).is_err(),
                "expected error for {:?}",
                raw
            );
        }
        // Below the 100pt floor
        assert!(n.normalize(&unknown(), "100pt", "17").is_err());
        // Stars above the scale
        assert!(n.normalize(&unknown(), "stars", "6").is_err());
    }

    #[test]
    fn test_every_valid_score_respects_band_invariant() {
        let n = ScoreNormalizer::new();
        let cases: Vec<(&str, String)> = (50..=100)
            .map(|p| ("100pt", p.to_string()))
            .chain((0..=40).map(|h| ("20pt", format!("{}", h as f64 / 2.0))))
            .chain((0..=50).map(|t| ("stars", format!("{}", t as f64 / 10.0))))
            .chain(
                ["gold", "silver", "bronze", "trophy", "commended"]
                    .iter()
                    .map(|m| ("medal", m.to_string())),
            )
            .chain((0..=100).step_by(5).map(|p| ("", p.to_string())))
            .collect();

        for (score_type, raw) in cases {
            let band = n.normalize(&unknown(), score_type, &raw).unwrap();
            assert!(
                0.0 <= band.min && band.min <= band.mid && band.mid <= band.max && band.max <= 100.0,
                "{} {:?} produced {:?}",
                score_type,
                raw,
                band
            );
        }
    }

    #[test]
    fn test_normalize_candidate_resolves_source_and_lens() {
        let n = ScoreNormalizer::new();
        let candidate = RatingCandidate::new("Vivino", "stars", "4.0");
        let rating = n.normalize_candidate(candidate, Some(2018)).unwrap();

        assert_eq!(rating.source_key, "vivino");
        assert_eq!(rating.lens, RatingLens::Community);
        assert_eq!(rating.score.mid, 90.0);
        assert_eq!(rating.rated_vintage, Some(2018));
    }

    #[test]
    fn test_medal_falls_back_to_award_name() {
        let n = ScoreNormalizer::new();
        let candidate = RatingCandidate::new("IWSC", "medal", "").with_award("Silver 2021");
        let rating = n.normalize_candidate(candidate, None).unwrap();
        assert_eq!(rating.lens, RatingLens::Competition);
        assert_eq!(rating.score.mid, 87.0);
    }
}
