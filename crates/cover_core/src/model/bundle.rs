use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{canonical_key, round_to, Country, FeatureRow, PolicyType, Tier};
use crate::error::AppError;

use super::encoder::{encode_row, FeatureEncoder};
use super::linear::{LinearClassifier, LinearRegressor};

pub const MODEL_FILE: &str = "model.json";

/// Probabilities are reported with this many decimals.
const PROBABILITY_DECIMALS: i32 = 4;

/// Trained artifacts for one (country, policy type) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelBundle {
    pub country: Country,
    pub policy_type: PolicyType,
    /// Expected classifier input, in encoder order.
    pub features: Vec<String>,
    pub encoders: Vec<FeatureEncoder>,
    pub classifier: LinearClassifier,
    pub regressor: LinearRegressor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPrediction {
    pub tier: Tier,
    pub probabilities: BTreeMap<Tier, f64>,
}

impl ModelBundle {
    /// Read `<dir>/model.json`. Any failure is a configuration error.
    pub fn load(dir: &Path) -> Result<Self, AppError> {
        let path = dir.join(MODEL_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| {
            AppError::new("CONFIG_MODEL_MISSING", "Failed to read model artifact")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| {
            let details = format!("path={}; {}", path.display(), e.details.clone().unwrap_or_default());
            e.with_details(details)
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let bundle: ModelBundle = serde_json::from_str(raw).map_err(|e| {
            AppError::new("CONFIG_MODEL_INVALID", "Failed to decode model artifact")
                .with_details(e.to_string())
        })?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.features.is_empty() || self.features.len() != self.encoders.len() {
            return Err(AppError::new(
                "CONFIG_MODEL_INVALID",
                "Feature list must be non-empty and have one encoder per feature",
            )
            .with_details(format!(
                "features={}; encoders={}",
                self.features.len(),
                self.encoders.len()
            )));
        }
        for (name, encoder) in self.features.iter().zip(self.encoders.iter()) {
            if canonical_key(name) != canonical_key(encoder.feature()) {
                return Err(AppError::new(
                    "CONFIG_MODEL_INVALID",
                    "Encoder order does not match the expected feature list",
                )
                .with_details(format!("feature={name}; encoder={}", encoder.feature())));
            }
            encoder.validate()?;
        }
        self.classifier.validate(self.encoded_width())?;
        self.regressor.validate()?;
        Ok(())
    }

    pub fn encoded_width(&self) -> usize {
        self.encoders.iter().map(FeatureEncoder::width).sum()
    }

    pub fn classify(&self, row: &FeatureRow) -> Result<ModelPrediction, AppError> {
        let x = encode_row(&self.encoders, row)?;
        let probs = self.classifier.predict_proba(&x);

        // Argmax on unrounded values; the earlier class wins a tie.
        let mut best = 0usize;
        for (idx, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = idx;
            }
        }

        let probabilities = self
            .classifier
            .classes
            .iter()
            .zip(probs.iter())
            .map(|(class, p)| (*class, round_to(*p, PROBABILITY_DECIMALS)))
            .collect();

        Ok(ModelPrediction {
            tier: self.classifier.classes[best],
            probabilities,
        })
    }

    /// Raw regressor output in INR.
    pub fn predict_premium(&self, row: &FeatureRow) -> Result<f64, AppError> {
        let x = encode_row(&self.regressor.encoders, row)?;
        Ok(self.regressor.predict(&x))
    }
}
