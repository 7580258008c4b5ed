//! Identity tokens derived from a wine record
//!
//! Tokens are lower-cased, accent-folded, punctuation-stripped words with
//! common particles ("de", "la", "the") removed. Years are pulled out
//! separately and "NV"/"non-vintage" markers become a flag instead of tokens.

use crate::types::Wine;

/// Words that carry no identity information
const STOP_WORDS: &[&str] = &[
    "the", "de", "du", "des", "la", "le", "les", "di", "del", "della", "da", "do", "dos", "von",
    "van", "and", "et", "y", "e", "of", "wine", "wines", "vino", "vin", "vinho",
];

/// Normalized identity of one wine, built once per resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTokenSet {
    pub name: Vec<String>,
    pub producer: Vec<String>,
    pub vintage: Option<i32>,
    pub region: Vec<String>,
    /// Name or style marks the wine as non-vintage
    pub non_vintage: bool,
}

impl IdentityTokenSet {
    pub fn from_wine(wine: &Wine) -> Self {
        let (name, name_nv) = split_non_vintage(tokenize(&wine.name));
        let (producer, _) = split_non_vintage(
            wine.producer.as_deref().map(tokenize).unwrap_or_default(),
        );
        let style_nv = wine
            .style
            .as_deref()
            .map(|style| split_non_vintage(tokenize(style)).1)
            .unwrap_or(false);

        let mut region: Vec<String> = Vec::new();
        for text in [wine.region.as_deref(), wine.country.as_deref()].into_iter().flatten() {
            for token in tokenize(text) {
                if !region.contains(&token) {
                    region.push(token);
                }
            }
        }

        Self {
            name,
            producer,
            vintage: wine.vintage,
            region,
            non_vintage: wine.vintage.is_none() || name_nv || style_nv,
        }
    }

    /// Producer tokens that do not already appear in the name
    pub fn distinct_producer_tokens(&self) -> Vec<&str> {
        self.producer
            .iter()
            .filter(|p| !self.name.contains(p))
            .map(String::as_str)
            .collect()
    }

    /// Stable key for caching per-identity artifacts
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name.join(" "),
            self.producer.join(" "),
            self.vintage.map(|v| v.to_string()).unwrap_or_else(|| "nv".to_string())
        )
    }
}

/// Tokens found in a candidate's label or evidence text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTokens {
    pub words: Vec<String>,
    pub years: Vec<i32>,
    pub non_vintage: bool,
}

impl LabelTokens {
    pub fn parse(text: &str) -> Self {
        let (words, non_vintage) = split_non_vintage(tokenize(text));
        Self {
            words,
            years: extract_years(text),
            non_vintage,
        }
    }
}

/// Lower-case, fold accents, split on anything non-alphanumeric, drop stop
/// words, single characters and four-digit years
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text.chars().flat_map(fold_char).collect();
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !is_year(t))
        .map(str::to_string)
        .collect()
}

/// Plausible vintage years (1900-2099) mentioned in free text
pub fn extract_years(text: &str) -> Vec<i32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|t| is_year(t))
        .filter_map(|t| t.parse().ok())
        .fold(Vec::new(), |mut years, y| {
            if !years.contains(&y) {
                years.push(y);
            }
            years
        })
}

/// Normalize a phrase for whole-word containment checks (`" grand cru "`)
pub fn normalize_phrase(text: &str) -> String {
    let folded: String = text.chars().flat_map(fold_char).collect();
    let words: Vec<&str> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

/// Remove non-vintage markers, reporting whether any were present
fn split_non_vintage(tokens: Vec<String>) -> (Vec<String>, bool) {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut non_vintage = false;
    let mut i = 0;
    while i < tokens.len() {
        let current = tokens[i].as_str();
        let next = tokens.get(i + 1).map(String::as_str);
        match (current, next) {
            ("nv", _) => {
                non_vintage = true;
                i += 1;
            }
            ("non", Some("vintage")) | ("multi", Some("vintage")) | ("sans", Some("annee")) => {
                non_vintage = true;
                i += 2;
            }
            _ => {
                kept.push(tokens[i].clone());
                i += 1;
            }
        }
    }
    (kept, non_vintage)
}

fn fold_char(c: char) -> Vec<char> {
    let lower = c.to_lowercase().next().unwrap_or(c);
    let folded = match lower {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ß' => return vec!['s', 's'],
        'œ' => return vec!['o', 'e'],
        other => other,
    };
    vec![folded]
}
