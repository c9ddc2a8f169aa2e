use std::fs;
use std::path::{Path, PathBuf};

use cover_core::decision::{hybrid_decide, TierPredictor};
use cover_core::domain::{Country, DecisionSource, FeatureValue, PolicyType, Tier};
use cover_core::error::ErrorKind;
use cover_core::model::{align_features, ModelBundle, ModelRegistry, MODEL_FILE};
use cover_core::profile::{normalize_profile, ProfileInput, UserProfile};
use cover_core::quote::quote_tiers;
use pretty_assertions::assert_eq;

fn models_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/models")
}

fn load(name: &str) -> ModelBundle {
    ModelBundle::load(&models_root().join(name)).expect("load bundle")
}

fn health_profile(country: &str) -> UserProfile {
    normalize_profile(&ProfileInput {
        country: Some(country.to_string()),
        policy_type: Some("health".to_string()),
        age: Some(40.0),
        sum_insured: Some(800_000.0),
        smoker: Some("No".to_string()),
        ..Default::default()
    })
    .expect("normalize")
}

#[test]
fn registry_loads_fixture_bundles_and_checks_coverage() {
    let registry = ModelRegistry::load_dir(&models_root()).expect("load registry");
    assert_eq!(registry.len(), 5);
    registry.require(&[Country::India]).expect("india is complete");

    let err = registry
        .require(&[Country::India, Country::Australia])
        .expect_err("australia has no bundles");
    assert_eq!(err.code, "CONFIG_MODEL_MISSING");
    assert!(err.details.unwrap_or_default().contains("australia_health"));
}

#[test]
fn missing_models_dir_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ModelRegistry::load_dir(&dir.path().join("nope")).expect_err("missing root");
    assert_eq!(err.code, "CONFIG_MODELS_DIR_MISSING");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn model_dir_without_artifact_fails_the_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("india_health")).expect("mkdir");
    fs::create_dir_all(dir.path().join("notes")).expect("mkdir");

    let err = ModelRegistry::load_dir(dir.path()).expect_err("no model.json");
    assert_eq!(err.code, "CONFIG_MODEL_MISSING");
}

#[test]
fn inconsistent_artifact_is_rejected_at_load() {
    let raw = fs::read_to_string(models_root().join("india_health").join(MODEL_FILE)).expect("read");
    let mut value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    value["classifier"]["intercepts"] = serde_json::json!([0.0]);

    let err = ModelBundle::from_json(&value.to_string()).expect_err("bad intercepts");
    assert_eq!(err.code, "CONFIG_MODEL_INVALID");
}

#[test]
fn directory_and_declared_key_must_agree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("india_travel");
    fs::create_dir_all(&target).expect("mkdir");
    fs::copy(
        models_root().join("india_health").join(MODEL_FILE),
        target.join(MODEL_FILE),
    )
    .expect("copy");

    let err = ModelRegistry::load_dir(dir.path()).expect_err("mismatch");
    assert_eq!(err.code, "CONFIG_MODEL_INVALID");
}

#[test]
fn alignment_fills_absent_features_with_missing_marker() {
    let profile = health_profile("IN");
    let expected = vec![
        "Age".to_string(),
        "Sum Assured".to_string(),
        "Policy Tier".to_string(),
    ];
    let aligned = align_features(&profile.feature_row(), &expected);
    assert_eq!(
        aligned,
        vec![
            FeatureValue::Number(40.0),
            FeatureValue::Number(800_000.0),
            FeatureValue::Missing,
        ]
    );
}

#[test]
fn classifier_probabilities_sum_to_one() {
    let registry = ModelRegistry::load_dir(&models_root()).expect("load registry");
    let decision = hybrid_decide(&health_profile("IN"), &registry).expect("decide");

    assert_eq!(decision.source, DecisionSource::MlClassifier);
    let probabilities = decision.probabilities.expect("probabilities");
    assert_eq!(probabilities.len(), 4);
    let total: f64 = probabilities.values().sum();
    assert!((total - 1.0).abs() <= 0.001, "total={total}");
    let best = probabilities
        .iter()
        .fold(None::<(Tier, f64)>, |acc, (t, p)| match acc {
            Some((_, bp)) if bp >= *p => acc,
            _ => Some((*t, *p)),
        })
        .map(|(t, _)| t);
    assert_eq!(best, Some(decision.tier));
}

#[test]
fn bundle_refuses_profiles_it_was_not_trained_for() {
    let bundle = load("india_health");
    let err = bundle
        .predict_tier(&health_profile("AU"))
        .expect_err("australia profile");
    assert_eq!(err.code, "CONFIG_MODEL_MISMATCH");
}

#[test]
fn tier_feature_sweep_predicts_once_per_tier() {
    let bundle = load("india_health");
    let quote = quote_tiers(&health_profile("IN"), &bundle).expect("quote");

    assert_eq!(quote.currency, "INR");
    assert!(quote.per_tier_regression);
    assert_eq!(quote.premiums.get(&Tier::Basic), Some(&9_625.0));
    assert_eq!(quote.premiums.get(&Tier::Standard), Some(&12_125.0));
    assert_eq!(quote.premiums.get(&Tier::Gold), Some(&15_125.0));
    assert_eq!(quote.premiums.get(&Tier::Premium), Some(&19_625.0));
}

#[test]
fn base_premium_scales_by_tier_multiplier() {
    let bundle = load("india_life");
    let profile = normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("life".to_string()),
        age: Some(40.0),
        sum_insured: Some(800_000.0),
        ..Default::default()
    })
    .expect("normalize");

    let quote = quote_tiers(&profile, &bundle).expect("quote");
    assert!(!quote.per_tier_regression);
    assert_eq!(quote.premiums.get(&Tier::Basic), Some(&8_325.0));
    assert_eq!(quote.premiums.get(&Tier::Standard), Some(&9_250.0));
    assert_eq!(quote.premiums.get(&Tier::Gold), Some(&11_100.0));
    assert_eq!(quote.premiums.get(&Tier::Premium), Some(&13_412.5));
}

#[test]
fn australian_quotes_convert_to_aud() {
    let mut bundle = load("india_health");
    bundle.country = Country::Australia;
    assert_eq!(bundle.policy_type, PolicyType::Health);

    let quote = quote_tiers(&health_profile("AU"), &bundle).expect("quote");
    assert_eq!(quote.currency, "AUD");
    assert_eq!(quote.premiums.get(&Tier::Standard), Some(&220.45));
}
