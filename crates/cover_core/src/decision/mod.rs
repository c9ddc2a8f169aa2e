use tracing::debug;

use crate::domain::{DecisionSource, HybridPrediction};
use crate::error::AppError;
use crate::model::{ModelBundle, ModelPrediction, ModelRegistry};
use crate::profile::UserProfile;
use crate::rules::apply_rules;

/// Probabilistic fallback used when no rule fires.
pub trait TierPredictor {
    fn predict_tier(&self, profile: &UserProfile) -> Result<ModelPrediction, AppError>;
}

impl TierPredictor for ModelBundle {
    fn predict_tier(&self, profile: &UserProfile) -> Result<ModelPrediction, AppError> {
        if (profile.country, profile.policy_type()) != (self.country, self.policy_type) {
            return Err(AppError::new(
                "CONFIG_MODEL_MISMATCH",
                "Model bundle does not cover this country and policy type",
            )
            .with_details(format!(
                "profile={}_{}; model={}_{}",
                profile.country.as_str(),
                profile.policy_type().as_str(),
                self.country.as_str(),
                self.policy_type.as_str()
            )));
        }
        self.classify(&profile.feature_row())
    }
}

impl TierPredictor for ModelRegistry {
    fn predict_tier(&self, profile: &UserProfile) -> Result<ModelPrediction, AppError> {
        self.get(profile.country, profile.policy_type())?
            .predict_tier(profile)
    }
}

/// Rule engine first; the predictor is consulted only when no rule fires.
pub fn hybrid_decide(
    profile: &UserProfile,
    predictor: &dyn TierPredictor,
) -> Result<HybridPrediction, AppError> {
    if let Some(tier) = apply_rules(profile)? {
        debug!(%tier, "rule engine decided");
        return Ok(HybridPrediction::from_rule(tier));
    }

    let prediction = predictor.predict_tier(profile)?;
    debug!(tier = %prediction.tier, "model decided");
    Ok(HybridPrediction {
        tier: prediction.tier,
        source: DecisionSource::MlClassifier,
        probabilities: Some(prediction.probabilities),
    })
}
