//! Static registry of known rating sources
//!
//! Source strings coming back from providers are free text ("Wine Spectator",
//! "wine-spectator", "WS"). They are resolved once per candidate into a sealed
//! [`RatingSource`]; anything unrecognised becomes `RatingSource::Unknown` and
//! gets its lens from the score scale instead of the registry.

use crate::types::RatingLens;

/// Scale a raw score is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreScale {
    /// 50-100 point scale, optionally a range ("90-92")
    Points100,
    /// 20 point scale
    Points20,
    /// 0-5 stars (community apps, some guides)
    Stars5,
    /// Competition medal names
    Medal,
    /// Italian guide glasses, 1-3
    Glasses3,
    /// Unknown scale, assumed already 0-100
    PassThrough,
}

impl ScoreScale {
    /// Map a provider's `score_type` hint to a scale
    ///
    /// Returns `None` for unrecognised hints so the source default applies.
    pub fn from_score_type(score_type: &str) -> Option<Self> {
        let hint = score_type.trim().to_lowercase();
        match hint.as_str() {
            "100pt" | "100" | "points" | "point" | "pts" | "100-point" => Some(Self::Points100),
            "20pt" | "20" | "20-point" => Some(Self::Points20),
            "stars" | "star" | "5star" | "5-star" => Some(Self::Stars5),
            "medal" | "medals" | "award" => Some(Self::Medal),
            "glasses" | "bicchieri" => Some(Self::Glasses3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Points100 => "100pt",
            Self::Points20 => "20pt",
            Self::Stars5 => "stars",
            Self::Medal => "medal",
            Self::Glasses3 => "glasses",
            Self::PassThrough => "passthrough",
        }
    }

    /// Lens for sources the registry does not know
    fn fallback_lens(self) -> RatingLens {
        match self {
            Self::Medal => RatingLens::Competition,
            Self::Stars5 => RatingLens::Community,
            _ => RatingLens::Critics,
        }
    }
}

/// Static facts about a known source
#[derive(Debug)]
pub struct SourceDescriptor {
    /// Canonical key persisted in `wine_ratings.source`
    pub key: &'static str,
    pub display_name: &'static str,
    pub lens: RatingLens,
    pub default_scale: ScoreScale,
    /// Relative weight inside the source's lens (1.0 = baseline)
    pub credibility: f64,
    /// Canonicalised alternative spellings
    pub aliases: &'static [&'static str],
}

/// Sources the pipeline recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownSource {
    DecanterWorldWineAwards,
    InternationalWineChallenge,
    Iwsc,
    ConcoursMondial,
    MundusVini,
    WineSpectator,
    WineAdvocate,
    JamesSuckling,
    JancisRobinson,
    Vinous,
    WineEnthusiast,
    TimAtkin,
    Halliday,
    GamberoRosso,
    Platters,
    Vivino,
    CellarTracker,
}

const DESCRIPTORS: &[(KnownSource, SourceDescriptor)] = &[
    (
        KnownSource::DecanterWorldWineAwards,
        SourceDescriptor {
            key: "decanter_wwa",
            display_name: "Decanter World Wine Awards",
            lens: RatingLens::Competition,
            default_scale: ScoreScale::Medal,
            credibility: 1.0,
            aliases: &["dwwa", "decanter_world_wine_awards", "decanter_awards"],
        },
    ),
    (
        KnownSource::InternationalWineChallenge,
        SourceDescriptor {
            key: "iwc",
            display_name: "International Wine Challenge",
            lens: RatingLens::Competition,
            default_scale: ScoreScale::Medal,
            credibility: 1.0,
            aliases: &["international_wine_challenge"],
        },
    ),
    (
        KnownSource::Iwsc,
        SourceDescriptor {
            key: "iwsc",
            display_name: "International Wine & Spirit Competition",
            lens: RatingLens::Competition,
            default_scale: ScoreScale::Medal,
            credibility: 0.9,
            aliases: &["international_wine_spirit_competition"],
        },
    ),
    (
        KnownSource::ConcoursMondial,
        SourceDescriptor {
            key: "concours_mondial",
            display_name: "Concours Mondial de Bruxelles",
            lens: RatingLens::Competition,
            default_scale: ScoreScale::Medal,
            credibility: 0.85,
            aliases: &["cmb", "concours_mondial_de_bruxelles"],
        },
    ),
    (
        KnownSource::MundusVini,
        SourceDescriptor {
            key: "mundus_vini",
            display_name: "Mundus Vini",
            lens: RatingLens::Competition,
            default_scale: ScoreScale::Medal,
            credibility: 0.8,
            aliases: &["mundusvini"],
        },
    ),
    (
        KnownSource::WineSpectator,
        SourceDescriptor {
            key: "wine_spectator",
            display_name: "Wine Spectator",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 1.0,
            aliases: &["ws", "winespectator"],
        },
    ),
    (
        KnownSource::WineAdvocate,
        SourceDescriptor {
            key: "wine_advocate",
            display_name: "Wine Advocate",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 1.0,
            aliases: &["wa", "robert_parker", "parker", "rp", "robert_parker_wine_advocate"],
        },
    ),
    (
        KnownSource::JamesSuckling,
        SourceDescriptor {
            key: "james_suckling",
            display_name: "James Suckling",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 0.85,
            aliases: &["js", "suckling", "jamessuckling"],
        },
    ),
    (
        KnownSource::JancisRobinson,
        SourceDescriptor {
            key: "jancis_robinson",
            display_name: "Jancis Robinson",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points20,
            credibility: 1.0,
            aliases: &["jr", "jancis", "jancisrobinson"],
        },
    ),
    (
        KnownSource::Vinous,
        SourceDescriptor {
            key: "vinous",
            display_name: "Vinous",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 0.95,
            aliases: &["antonio_galloni", "galloni"],
        },
    ),
    (
        KnownSource::WineEnthusiast,
        SourceDescriptor {
            key: "wine_enthusiast",
            display_name: "Wine Enthusiast",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 0.8,
            aliases: &["we", "wineenthusiast"],
        },
    ),
    (
        KnownSource::TimAtkin,
        SourceDescriptor {
            key: "tim_atkin",
            display_name: "Tim Atkin MW",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 0.85,
            aliases: &["atkin", "tim_atkin_mw"],
        },
    ),
    (
        KnownSource::Halliday,
        SourceDescriptor {
            key: "halliday",
            display_name: "Halliday Wine Companion",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Points100,
            credibility: 0.85,
            aliases: &["halliday_wine_companion", "james_halliday"],
        },
    ),
    (
        KnownSource::GamberoRosso,
        SourceDescriptor {
            key: "gambero_rosso",
            display_name: "Gambero Rosso",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Glasses3,
            credibility: 0.9,
            aliases: &["gambero", "tre_bicchieri", "gamberorosso"],
        },
    ),
    (
        KnownSource::Platters,
        SourceDescriptor {
            key: "platters",
            display_name: "Platter's Wine Guide",
            lens: RatingLens::Critics,
            default_scale: ScoreScale::Stars5,
            credibility: 0.85,
            aliases: &["platter", "platters_wine_guide", "platter_s"],
        },
    ),
    (
        KnownSource::Vivino,
        SourceDescriptor {
            key: "vivino",
            display_name: "Vivino",
            lens: RatingLens::Community,
            default_scale: ScoreScale::Stars5,
            credibility: 0.7,
            aliases: &[],
        },
    ),
    (
        KnownSource::CellarTracker,
        SourceDescriptor {
            key: "cellartracker",
            display_name: "CellarTracker",
            lens: RatingLens::Community,
            default_scale: ScoreScale::Points100,
            credibility: 0.8,
            aliases: &["ct", "cellar_tracker"],
        },
    ),
];

impl KnownSource {
    pub fn descriptor(self) -> &'static SourceDescriptor {
        DESCRIPTORS
            .iter()
            .find(|(source, _)| *source == self)
            .map(|(_, descriptor)| descriptor)
            // Every variant has a row in DESCRIPTORS (checked by tests)
            .unwrap_or(&DESCRIPTORS[0].1)
    }

    fn lookup(canonical: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|(_, d)| d.key == canonical || d.aliases.contains(&canonical))
            .map(|(source, _)| *source)
    }
}

/// Source of a rating after registry resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RatingSource {
    Known(KnownSource),
    /// Canonicalised form of an unrecognised source string
    Unknown(String),
}

impl RatingSource {
    /// Resolve a free-text source name against the registry
    pub fn resolve(raw: &str) -> Self {
        let canonical = canonicalize(raw);
        match KnownSource::lookup(&canonical) {
            Some(known) => Self::Known(known),
            None => Self::Unknown(canonical),
        }
    }

    /// Key persisted with the rating
    pub fn key(&self) -> &str {
        match self {
            Self::Known(source) => source.descriptor().key,
            Self::Unknown(key) => key,
        }
    }

    /// Human-readable name; unknown sources show their canonical key
    pub fn display_name(&self) -> &str {
        match self {
            Self::Known(source) => source.descriptor().display_name,
            Self::Unknown(key) => key,
        }
    }

    pub fn default_scale(&self) -> ScoreScale {
        match self {
            Self::Known(source) => source.descriptor().default_scale,
            Self::Unknown(_) => ScoreScale::PassThrough,
        }
    }

    /// Lens of the rating; unknown sources fall back to the scale's lens
    pub fn lens(&self, scale: ScoreScale) -> RatingLens {
        match self {
            Self::Known(source) => source.descriptor().lens,
            Self::Unknown(_) => scale.fallback_lens(),
        }
    }

    pub fn credibility(&self) -> f64 {
        match self {
            Self::Known(source) => source.descriptor().credibility,
            Self::Unknown(_) => 1.0,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Lowercase, collapse every run of non-alphanumerics into one underscore
fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}
