use std::cell::Cell;
use std::collections::BTreeMap;

use cover_core::decision::{hybrid_decide, TierPredictor};
use cover_core::domain::{DecisionSource, Tier};
use cover_core::error::{AppError, ErrorKind};
use cover_core::model::ModelPrediction;
use cover_core::profile::{normalize_profile, ProfileInput, UserProfile};
use cover_core::rules::apply_rules;
use pretty_assertions::assert_eq;

struct CountingPredictor {
    calls: Cell<usize>,
}

impl CountingPredictor {
    fn new() -> Self {
        Self { calls: Cell::new(0) }
    }
}

impl TierPredictor for CountingPredictor {
    fn predict_tier(&self, _profile: &UserProfile) -> Result<ModelPrediction, AppError> {
        self.calls.set(self.calls.get() + 1);
        let mut probabilities = BTreeMap::new();
        probabilities.insert(Tier::Basic, 0.1);
        probabilities.insert(Tier::Standard, 0.6);
        probabilities.insert(Tier::Gold, 0.2);
        probabilities.insert(Tier::Premium, 0.1);
        Ok(ModelPrediction {
            tier: Tier::Standard,
            probabilities,
        })
    }
}

struct BrokenPredictor;

impl TierPredictor for BrokenPredictor {
    fn predict_tier(&self, _profile: &UserProfile) -> Result<ModelPrediction, AppError> {
        Err(AppError::new("CONFIG_MODEL_MISSING", "no model"))
    }
}

fn health(age: f64, sum_insured: f64, smoker: &str, issues: &str) -> UserProfile {
    normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("HEALTH".to_string()),
        age: Some(age),
        sum_insured: Some(sum_insured),
        smoker: Some(smoker.to_string()),
        health_issues: Some(issues.to_string()),
        ..Default::default()
    })
    .expect("normalize")
}

fn vehicle(price: f64, age: f64, kind: &str) -> UserProfile {
    normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("VEHICLE".to_string()),
        vehicle_price: Some(price),
        vehicle_age: Some(age),
        vehicle_type: Some(kind.to_string()),
        ..Default::default()
    })
    .expect("normalize")
}

fn house(value: f64, kind: &str) -> UserProfile {
    normalize_profile(&ProfileInput {
        country: Some("AU".to_string()),
        policy_type: Some("HOUSE".to_string()),
        property_value: Some(value),
        property_type: Some(kind.to_string()),
        ..Default::default()
    })
    .expect("normalize")
}

fn travel(days: f64, condition: &str, cancellation: &str) -> UserProfile {
    normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("TRAVEL".to_string()),
        trip_duration_days: Some(days),
        existing_medical_condition: Some(condition.to_string()),
        trip_cancellation_coverage: Some(cancellation.to_string()),
        ..Default::default()
    })
    .expect("normalize")
}

#[test]
fn health_thresholds_pick_fixed_tiers() {
    assert_eq!(apply_rules(&health(35.0, 5_000_000.0, "No", "")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&health(62.0, 400_000.0, "Yes", "")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&health(55.0, 1_000_000.0, "No", "")).expect("rules"), Some(Tier::Gold));
    assert_eq!(apply_rules(&health(25.0, 300_000.0, "No", "none")).expect("rules"), Some(Tier::Basic));
}

#[test]
fn health_rules_fall_through_between_thresholds() {
    assert_eq!(apply_rules(&health(40.0, 800_000.0, "No", "")).expect("rules"), None);
    // A declared condition blocks the entry-level rule.
    assert_eq!(apply_rules(&health(25.0, 300_000.0, "No", "diabetes")).expect("rules"), None);
    assert_eq!(apply_rules(&health(25.0, 300_000.0, "Yes", "")).expect("rules"), None);
}

#[test]
fn vehicle_house_and_travel_rules() {
    assert_eq!(apply_rules(&vehicle(500_000.0, 1.0, "Luxury")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&vehicle(3_000_000.0, 1.0, "car")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&vehicle(900_000.0, 2.0, "Commercial")).expect("rules"), Some(Tier::Gold));
    assert_eq!(apply_rules(&vehicle(900_000.0, 12.0, "car")).expect("rules"), Some(Tier::Basic));
    assert_eq!(apply_rules(&vehicle(90_000.0, 1.0, "2-Wheeler")).expect("rules"), Some(Tier::Basic));
    assert_eq!(apply_rules(&vehicle(800_000.0, 3.0, "car")).expect("rules"), None);

    assert_eq!(apply_rules(&house(25_000_000.0, "apartment")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&house(12_000_000.0, "Villa")).expect("rules"), Some(Tier::Gold));
    assert_eq!(apply_rules(&house(900_000.0, "house")).expect("rules"), Some(Tier::Basic));
    assert_eq!(apply_rules(&house(5_000_000.0, "house")).expect("rules"), None);

    assert_eq!(apply_rules(&travel(45.0, "Yes", "No")).expect("rules"), Some(Tier::Premium));
    assert_eq!(apply_rules(&travel(120.0, "No", "No")).expect("rules"), Some(Tier::Gold));
    assert_eq!(apply_rules(&travel(5.0, "No", "No")).expect("rules"), Some(Tier::Basic));
    assert_eq!(apply_rules(&travel(5.0, "No", "Yes")).expect("rules"), None);
}

#[test]
fn missing_required_field_is_a_validation_error() {
    let profile = normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("HEALTH".to_string()),
        age: Some(40.0),
        ..Default::default()
    })
    .expect("normalize");

    let err = apply_rules(&profile).expect_err("sum insured is required");
    assert_eq!(err.code, "VALIDATION_RULE_INPUT_MISSING");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.details.unwrap_or_default().contains("sum_insured"));
}

#[test]
fn rule_decision_never_invokes_the_model() {
    let predictor = CountingPredictor::new();
    let decision = hybrid_decide(&health(30.0, 6_000_000.0, "No", ""), &predictor).expect("decide");

    assert_eq!(decision.tier, Tier::Premium);
    assert_eq!(decision.source, DecisionSource::RuleEngine);
    assert_eq!(decision.probabilities, None);
    assert_eq!(predictor.calls.get(), 0);
}

#[test]
fn model_fallback_reports_probabilities() {
    let predictor = CountingPredictor::new();
    let decision = hybrid_decide(&health(40.0, 800_000.0, "No", ""), &predictor).expect("decide");

    assert_eq!(decision.tier, Tier::Standard);
    assert_eq!(decision.source, DecisionSource::MlClassifier);
    let total: f64 = decision
        .probabilities
        .expect("probabilities")
        .values()
        .sum();
    assert!((total - 1.0).abs() <= 0.001);
    assert_eq!(predictor.calls.get(), 1);
}

#[test]
fn predictor_errors_propagate() {
    let err = hybrid_decide(&vehicle(800_000.0, 3.0, "car"), &BrokenPredictor)
        .expect_err("model failure");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
