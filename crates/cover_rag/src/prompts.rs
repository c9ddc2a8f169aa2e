use cover_core::domain::{DecisionSource, HybridPrediction};
use cover_core::profile::UserProfile;

use crate::graph::Fact;
use crate::retrieve::EvidencePack;

pub fn format_facts(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return " - (no graph facts)".to_string();
    }
    facts
        .iter()
        .map(|f| format!(" - {} -[{}]-> {}", f.subject, f.relation, f.object))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_contexts(contexts: &[String]) -> String {
    if contexts.is_empty() {
        return "(no contexts)".to_string();
    }
    contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[CTX {}] {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        return " - (n/a)".to_string();
    }
    sources
        .iter()
        .map(|s| format!(" - {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_prediction(prediction: &HybridPrediction) -> String {
    let source = match prediction.source {
        DecisionSource::RuleEngine => "rule_engine",
        DecisionSource::MlClassifier => "ml_classifier",
    };
    let probabilities = match &prediction.probabilities {
        Some(probs) => probs
            .iter()
            .map(|(tier, p)| format!("{tier}={p:.4}"))
            .collect::<Vec<_>>()
            .join(", "),
        None => "n/a".to_string(),
    };
    format!(
        "Source: {source}\nSuggested Tier: {}\nModel Probabilities: {probabilities}",
        prediction.tier
    )
}

/// Free-form question over the evidence pack; used by the `query` command.
pub fn build_evidence_prompt(
    question: &str,
    pack: &EvidencePack,
    prediction: Option<&HybridPrediction>,
) -> String {
    let prediction = prediction
        .map(format_prediction)
        .unwrap_or_else(|| "(none)".to_string());
    format!(
        r#"You are an insurance assistant. Use only the evidence below.

User question:
{question}

Model prediction:
{prediction}

Graph facts:
{facts}

Contexts:
{contexts}

Top vector sources:
{sources}

Answer clearly. If something is not supported by evidence, say you don't know.
"#,
        facts = format_facts(&pack.facts),
        contexts = format_contexts(&pack.contexts),
        sources = format_sources(&pack.sources),
    )
}

/// Recommendation prompt: profile summary, hybrid decision and evidence.
pub fn build_recommendation_prompt(
    profile: &UserProfile,
    prediction: &HybridPrediction,
    pack: &EvidencePack,
) -> String {
    format!(
        r#"Task: Recommend the most suitable insurance policy tier for the user and justify it.
Language: {language}

Rules (non-negotiable):
1) Use ONLY the profile, prediction and evidence below. Do not invent policy terms.
2) Keep the suggested tier unless the evidence clearly contradicts it.
3) If something is not supported by evidence, say you don't know.

Return:
1) A one-line recommendation with the tier.
2) 3-5 bullet reasons grounded in the evidence.
3) A short counterfactual: what would change the recommendation.
4) A plain table of key parameters you used.

=== USER PROFILE (structured) ===
{profile}

=== HYBRID PREDICTION (rules + model) ===
{prediction}

=== RETRIEVAL EVIDENCE (Graph + Vector) ===
Query: {query}

Graph facts:
{facts}

Contexts:
{contexts}

Top vector sources:
{sources}
"#,
        language = profile.language,
        profile = profile.summary_lines().join("\n"),
        prediction = format_prediction(prediction),
        query = pack.query,
        facts = format_facts(&pack.facts),
        contexts = format_contexts(&pack.contexts),
        sources = format_sources(&pack.sources),
    )
}
