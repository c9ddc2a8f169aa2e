use serde::{Deserialize, Serialize};

use crate::domain::Tier;
use crate::error::AppError;

use super::encoder::FeatureEncoder;

/// Multinomial linear classifier; probabilities come from a softmax over class scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearClassifier {
    pub classes: Vec<Tier>,
    /// One row per class, one column per encoded dimension.
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearClassifier {
    pub(crate) fn validate(&self, dims: usize) -> Result<(), AppError> {
        if self.classes.is_empty() {
            return Err(AppError::new("CONFIG_MODEL_INVALID", "Classifier has no classes"));
        }
        let mut seen = self.classes.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.classes.len() {
            return Err(AppError::new("CONFIG_MODEL_INVALID", "Classifier classes must be unique"));
        }
        if self.coefficients.len() != self.classes.len() || self.intercepts.len() != self.classes.len() {
            return Err(AppError::new(
                "CONFIG_MODEL_INVALID",
                "Classifier coefficient rows and intercepts must match class count",
            )
            .with_details(format!(
                "classes={}; rows={}; intercepts={}",
                self.classes.len(),
                self.coefficients.len(),
                self.intercepts.len()
            )));
        }
        for (class, row) in self.classes.iter().zip(self.coefficients.iter()) {
            if row.len() != dims {
                return Err(AppError::new(
                    "CONFIG_MODEL_INVALID",
                    "Classifier coefficient width does not match encoded feature width",
                )
                .with_details(format!("class={class}; expected={dims}; got={}", row.len())));
            }
        }
        Ok(())
    }

    /// Class probabilities in `classes` order.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(self.intercepts.iter())
            .map(|(row, b)| dot(row, x) + b)
            .collect();
        softmax(&scores)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegressor {
    pub encoders: Vec<FeatureEncoder>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// When set, the regressor was trained with a policy-tier column of this name and premiums
    /// are swept by setting it to each tier.
    #[serde(default)]
    pub tier_feature: Option<String>,
}

impl LinearRegressor {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        for encoder in &self.encoders {
            encoder.validate()?;
        }
        let dims: usize = self.encoders.iter().map(FeatureEncoder::width).sum();
        if self.coefficients.len() != dims {
            return Err(AppError::new(
                "CONFIG_MODEL_INVALID",
                "Regressor coefficient count does not match encoded feature width",
            )
            .with_details(format!("expected={dims}; got={}", self.coefficients.len())));
        }
        if let Some(tier_feature) = &self.tier_feature {
            let declared = self
                .encoders
                .iter()
                .any(|e| e.is_categorical() && e.feature() == tier_feature);
            if !declared {
                return Err(AppError::new(
                    "CONFIG_MODEL_INVALID",
                    "Regressor tier_feature must name one of its categorical encoders",
                )
                .with_details(format!("tier_feature={tier_feature}")));
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        dot(&self.coefficients, x) + self.intercept
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_is_shift_invariant_and_normalized() {
        let p = softmax(&[1000.0, 1001.0, 999.0]);
        let total: f64 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }
}
