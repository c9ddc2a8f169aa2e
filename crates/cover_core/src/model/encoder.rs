use serde::{Deserialize, Serialize};

use crate::domain::{canonical_key, FeatureRow, FeatureValue};
use crate::error::AppError;

/// Per-feature transform learned at training time.
///
/// Numeric features are imputed then standardized; categorical features are one-hot encoded
/// with an all-zero vector for missing or unseen values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureEncoder {
    Numeric {
        feature: String,
        mean: f64,
        scale: f64,
        /// Training-time fill value for a missing input.
        impute: f64,
    },
    Categorical {
        feature: String,
        categories: Vec<String>,
    },
}

impl FeatureEncoder {
    pub fn feature(&self) -> &str {
        match self {
            FeatureEncoder::Numeric { feature, .. } => feature,
            FeatureEncoder::Categorical { feature, .. } => feature,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FeatureEncoder::Numeric { .. } => 1,
            FeatureEncoder::Categorical { categories, .. } => categories.len(),
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureEncoder::Categorical { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        match self {
            FeatureEncoder::Numeric {
                feature,
                mean,
                scale,
                impute,
            } => {
                if !(mean.is_finite() && impute.is_finite() && scale.is_finite() && *scale > 0.0) {
                    return Err(AppError::new(
                        "CONFIG_MODEL_INVALID",
                        "Numeric encoder parameters must be finite with a positive scale",
                    )
                    .with_details(format!("feature={feature}; mean={mean}; scale={scale}; impute={impute}")));
                }
            }
            FeatureEncoder::Categorical {
                feature,
                categories,
            } => {
                if categories.is_empty() {
                    return Err(AppError::new(
                        "CONFIG_MODEL_INVALID",
                        "Categorical encoder has no categories",
                    )
                    .with_details(format!("feature={feature}")));
                }
            }
        }
        Ok(())
    }

    fn encode_into(&self, value: &FeatureValue, out: &mut Vec<f64>) -> Result<(), AppError> {
        match self {
            FeatureEncoder::Numeric {
                feature,
                mean,
                scale,
                impute,
            } => {
                let raw = match value {
                    FeatureValue::Number(v) => *v,
                    FeatureValue::Missing => *impute,
                    FeatureValue::Category(s) => s.trim().parse::<f64>().map_err(|_| {
                        AppError::new(
                            "VALIDATION_FEATURE_TYPE",
                            "Expected a numeric value for model feature",
                        )
                        .with_details(format!("feature={feature}; value={s}"))
                    })?,
                };
                out.push((raw - mean) / scale);
            }
            FeatureEncoder::Categorical { categories, .. } => {
                let key = match value {
                    FeatureValue::Category(s) => Some(canonical_key(s)),
                    FeatureValue::Number(v) => Some(canonical_key(&v.to_string())),
                    FeatureValue::Missing => None,
                };
                for category in categories {
                    let hit = key.as_deref() == Some(canonical_key(category).as_str());
                    out.push(if hit { 1.0 } else { 0.0 });
                }
            }
        }
        Ok(())
    }
}

/// Reorders `row` into the model's expected feature order. Names are compared after
/// canonicalization; anything the row lacks becomes `FeatureValue::Missing`.
pub fn align_features(row: &FeatureRow, expected: &[String]) -> Vec<FeatureValue> {
    expected
        .iter()
        .map(|name| {
            let key = canonical_key(name);
            row.iter()
                .find(|(k, _)| canonical_key(k) == key)
                .map(|(_, v)| v.clone())
                .unwrap_or(FeatureValue::Missing)
        })
        .collect()
}

pub fn encode_row(encoders: &[FeatureEncoder], row: &FeatureRow) -> Result<Vec<f64>, AppError> {
    let names: Vec<String> = encoders.iter().map(|e| e.feature().to_string()).collect();
    let aligned = align_features(row, &names);
    let mut out = Vec::with_capacity(encoders.iter().map(FeatureEncoder::width).sum());
    for (encoder, value) in encoders.iter().zip(aligned.iter()) {
        encoder.encode_into(value, &mut out)?;
    }
    Ok(out)
}
