//! End-to-end recommendation: normalize, decide, retrieve, explain.
//!
//! Every error leaving [`Recommender::recommend`] carries the stage it came from. The
//! explanation stage is the only one allowed to degrade; everything else aborts the request.

use std::collections::BTreeMap;

use cover_core::decision::hybrid_decide;
use cover_core::domain::{DecisionSource, HybridPrediction, PolicyType, Tier, ValidationWarning};
use cover_core::error::AppError;
use cover_core::model::{ModelRegistry, MODEL_MISSING};
use cover_core::premium::{self, PremiumEstimate};
use cover_core::profile::{normalize_profile, ProfileInput, UserProfile};
use cover_core::quote::{quote_tiers, TierQuote};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::graph::Fact;
use crate::llm::Completer;
use crate::prompts::build_recommendation_prompt;
use crate::retrieve::{EvidencePack, HybridRetriever, DEFAULT_K_GRAPH, DEFAULT_K_VECTOR};

pub const STAGE_NORMALIZE: &str = "normalize";
pub const STAGE_DECISION: &str = "decision";
pub const STAGE_RETRIEVAL: &str = "retrieval";
pub const STAGE_EXPLANATION: &str = "explanation";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub tier: Tier,
    pub source: DecisionSource,
    pub probabilities: Option<BTreeMap<Tier, f64>>,
    pub explanation: String,
    pub explanation_fallback: bool,
    pub evidence_sources: Vec<String>,
    pub graph_facts: Vec<Fact>,
    pub contexts: Vec<String>,
    pub premium_estimate: Option<PremiumEstimate>,
    pub tier_quote: Option<TierQuote>,
    /// Parts of the response that were left out, and why.
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteResponse {
    pub country: String,
    pub policy_type: PolicyType,
    pub premium_estimate: Option<PremiumEstimate>,
    pub tier_quote: TierQuote,
}

pub struct Recommender {
    registry: ModelRegistry,
    retriever: HybridRetriever,
    completer: Box<dyn Completer>,
    k_vector: usize,
    k_graph: usize,
}

impl Recommender {
    pub fn new(
        registry: ModelRegistry,
        retriever: HybridRetriever,
        completer: Box<dyn Completer>,
    ) -> Self {
        Self {
            registry,
            retriever,
            completer,
            k_vector: DEFAULT_K_VECTOR,
            k_graph: DEFAULT_K_GRAPH,
        }
    }

    pub fn with_retrieval_sizes(mut self, k_vector: usize, k_graph: usize) -> Self {
        self.k_vector = k_vector;
        self.k_graph = k_graph;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub fn recommend(&self, input: &ProfileInput) -> Result<Recommendation, AppError> {
        let profile = normalize_profile(input).map_err(|e| e.with_stage(STAGE_NORMALIZE))?;
        info!(
            country = profile.country.as_str(),
            policy_type = profile.policy_type().as_str(),
            "profile normalized"
        );

        let decision = hybrid_decide(&profile, &self.registry)
            .map_err(|e| e.with_stage(STAGE_DECISION))?;
        let mut warnings = Vec::new();
        // A rule decision needs no model, so a missing bundle only drops the tier quote.
        let tier_quote = match self.registry.get(profile.country, profile.policy_type()) {
            Ok(bundle) => {
                Some(quote_tiers(&profile, bundle).map_err(|e| e.with_stage(STAGE_DECISION))?)
            }
            Err(e) if e.code == MODEL_MISSING => {
                warn!(code = %e.code, details = ?e.details, "tier quote omitted");
                warnings.push(
                    ValidationWarning::new(e.code, "Tier quote omitted: no model for this profile")
                        .with_details(e.details.unwrap_or_default()),
                );
                None
            }
            Err(e) => return Err(e.with_stage(STAGE_DECISION)),
        };
        info!(tier = %decision.tier, source = ?decision.source, "decision made");

        let query = build_query(&profile);
        let pack = self
            .retriever
            .retrieve(&query, self.k_vector, self.k_graph)
            .map_err(|e| e.with_stage(STAGE_RETRIEVAL))?;
        info!(
            query = %query,
            contexts = pack.contexts.len(),
            facts = pack.facts.len(),
            "evidence retrieved"
        );

        let prompt = build_recommendation_prompt(&profile, &decision, &pack);
        let (explanation, explanation_fallback) =
            match self.completer.complete(&prompt, &profile.language) {
                Ok(text) => (text, false),
                Err(e) => {
                    let e = e.with_stage(STAGE_EXPLANATION);
                    warn!(error = %e, "explanation unavailable; using templated fallback");
                    (fallback_explanation(&profile, &decision, &pack), true)
                }
            };
        info!(fallback = explanation_fallback, "explanation ready");

        Ok(Recommendation {
            tier: decision.tier,
            source: decision.source,
            probabilities: decision.probabilities,
            explanation,
            explanation_fallback,
            evidence_sources: pack.sources,
            graph_facts: pack.facts,
            contexts: pack.contexts,
            premium_estimate: premium::estimate(&profile),
            tier_quote,
            warnings,
        })
    }
}

/// Formula estimate plus the per-tier model sweep, without retrieval or explanation.
pub fn quote(registry: &ModelRegistry, input: &ProfileInput) -> Result<QuoteResponse, AppError> {
    let profile = normalize_profile(input).map_err(|e| e.with_stage(STAGE_NORMALIZE))?;
    let bundle = registry
        .get(profile.country, profile.policy_type())
        .map_err(|e| e.with_stage(STAGE_DECISION))?;
    let tier_quote = quote_tiers(&profile, bundle).map_err(|e| e.with_stage(STAGE_DECISION))?;
    Ok(QuoteResponse {
        country: profile.country.as_str().to_string(),
        policy_type: profile.policy_type(),
        premium_estimate: premium::estimate(&profile),
        tier_quote,
    })
}

/// `"{Policy} insurance for {Country}: exclusions for {issues}, smoker, travel {n} days"`,
/// with absent parts left out.
pub fn build_query(profile: &UserProfile) -> String {
    let mut query = format!(
        "{} insurance for {}: ",
        profile.policy_type().display_name(),
        profile.country.display_name()
    );
    let issues = profile.health_issues();
    if !issues.is_empty() {
        query.push_str(&format!("exclusions for {}, ", issues.join(", ")));
    }
    if profile.is_smoker() {
        query.push_str("smoker, ");
    }
    if let Some(days) = profile.trip_duration_days() {
        query.push_str(&format!("travel {days} days, "));
    }
    query
        .trim_end_matches(|c: char| c == ',' || c == ' ' || c == ':')
        .to_string()
}

fn fallback_explanation(
    profile: &UserProfile,
    decision: &HybridPrediction,
    pack: &EvidencePack,
) -> String {
    let basis = match decision.source {
        DecisionSource::RuleEngine => "an underwriting rule matched the profile".to_string(),
        DecisionSource::MlClassifier => match &decision.probabilities {
            Some(probs) => format!(
                "the tier model gave it the highest probability ({:.2})",
                probs.get(&decision.tier).copied().unwrap_or_default()
            ),
            None => "the tier model selected it".to_string(),
        },
    };
    let mut out = format!(
        "Recommended tier: {} for {} insurance in {}.\nBasis: {basis}.",
        decision.tier,
        profile.policy_type().display_name(),
        profile.country.display_name()
    );
    if !pack.sources.is_empty() {
        out.push_str(&format!("\nRelevant documents: {}.", pack.sources.join(", ")));
    }
    out.push_str("\nA detailed explanation is unavailable right now.");
    out
}
