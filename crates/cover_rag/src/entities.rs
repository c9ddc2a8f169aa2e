//! Domain entity extraction for chunk previews and retrieval queries.
//!
//! Three strategies contribute candidates, ranked in this order: domain vocabulary hits,
//! whitelisted keywords, then capitalized phrases. Inside a strategy candidates are ordered by
//! where they first appear in the text. The first `top_k` distinct names win, so the same text
//! always yields the same entities.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::error;

const DOMAIN_VOCAB: &[&str] = &[
    // health / life
    "pre-existing condition",
    "waiting period",
    "claim settlement",
    "exclusion",
    "premium",
    "co-payment",
    "sum insured",
    "deductible",
    "grace period",
    "smoker",
    "diabetes",
    "cancer",
    "maternity",
    "cholesterol",
    "hypertension",
    // vehicle
    "idv",
    "insured declared value",
    "depreciation",
    "accident",
    "third party",
    "own damage",
    "engine protection",
    "zero depreciation",
    "car",
    "bike",
    "truck",
    // travel
    "baggage",
    "trip cancellation",
    "delay",
    "hospitalization abroad",
    "medical evacuation",
    "loss of passport",
    "travel assistance",
    // property
    "fire",
    "flood",
    "earthquake",
    "theft",
    "burglary",
    "natural calamity",
    "property value",
    "property age",
    "apartment",
    "bungalow",
    "villa",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "for", "with", "on", "in", "by",
];

const KEYWORDS: &[&str] = &[
    "diabetes",
    "cancer",
    "maternity",
    "accident",
    "hospital",
    "baggage",
    "fire",
    "flood",
    "idv",
    "depreciation",
];

pub const CHUNK_ENTITY_LIMIT: usize = 12;
pub const QUERY_ENTITY_LIMIT: usize = 10;

static CAPITALIZED_PHRASE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+){0,3})\b"));

static KEYWORD_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"[A-Za-z][A-Za-z\-]{3,}"));

/// Runs once per pattern; a pattern that fails to compile is logged and its strategy yields
/// nothing.
fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(pattern, err = %e, "entity pattern failed to compile");
            None
        }
    }
}

/// Up to `top_k` distinct entity names, in rank order.
pub fn extract_entities(text: &str, top_k: usize) -> Vec<String> {
    let mut ranked: Vec<String> = Vec::new();
    ranked.extend(vocabulary_hits(text));
    ranked.extend(keyword_hits(text));
    ranked.extend(capitalized_phrases(text));

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .take(top_k)
        .collect()
}

fn vocabulary_hits(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut hits: Vec<(usize, &str)> = DOMAIN_VOCAB
        .iter()
        .filter_map(|term| lowered.find(term).map(|pos| (pos, *term)))
        .collect();
    // Stable: terms found at the same offset keep vocabulary order.
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, term)| term.to_string()).collect()
}

fn keyword_hits(text: &str) -> Vec<String> {
    let Some(re) = KEYWORD_TOKEN.as_ref() else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| m.as_str())
        .filter(|token| KEYWORDS.contains(&token.to_lowercase().as_str()))
        .map(capitalize)
        .collect()
}

fn capitalized_phrases(text: &str) -> Vec<String> {
    let Some(re) = CAPITALIZED_PHRASE.as_ref() else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|cand| !STOP_WORDS.contains(&cand.to_lowercase().as_str()))
        .filter(|cand| cand.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// First letter upper-cased, the rest lower-cased.
fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
