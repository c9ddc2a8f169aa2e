use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Ordinal coverage level. Ordering follows coverage breadth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Basic,
    Standard,
    Gold,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Basic, Tier::Standard, Tier::Gold, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "Basic",
            Tier::Standard => "Standard",
            Tier::Gold => "Gold",
            Tier::Premium => "Premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "standard" => Ok(Tier::Standard),
            "gold" => Ok(Tier::Gold),
            "premium" => Ok(Tier::Premium),
            _ => Err(AppError::new("VALIDATION_TIER_UNKNOWN", "Unknown coverage tier")
                .with_details(format!("value={s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Country {
    India,
    Australia,
}

impl Country {
    pub const ALL: [Country; 2] = [Country::India, Country::Australia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::India => "india",
            Country::Australia => "australia",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Country::India => "India",
            Country::Australia => "Australia",
        }
    }
}

impl FromStr for Country {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" | "INDIA" => Ok(Country::India),
            "AU" | "AUSTRALIA" => Ok(Country::Australia),
            _ => Err(AppError::new(
                "VALIDATION_COUNTRY_UNKNOWN",
                "Country must be one of IN, AU, INDIA, AUSTRALIA",
            )
            .with_details(format!("value={s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Health,
    Life,
    Vehicle,
    House,
    Travel,
}

impl PolicyType {
    pub const ALL: [PolicyType; 5] = [
        PolicyType::Health,
        PolicyType::Life,
        PolicyType::Vehicle,
        PolicyType::House,
        PolicyType::Travel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Health => "health",
            PolicyType::Life => "life",
            PolicyType::Vehicle => "vehicle",
            PolicyType::House => "house",
            PolicyType::Travel => "travel",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PolicyType::Health => "Health",
            PolicyType::Life => "Life",
            PolicyType::Vehicle => "Vehicle",
            PolicyType::House => "House",
            PolicyType::Travel => "Travel",
        }
    }
}

impl FromStr for PolicyType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_key(s).as_str() {
            "health" => Ok(PolicyType::Health),
            "life" => Ok(PolicyType::Life),
            "vehicle" | "motor" => Ok(PolicyType::Vehicle),
            "house" | "property" | "home" => Ok(PolicyType::House),
            "travel" => Ok(PolicyType::Travel),
            _ => Err(AppError::new(
                "VALIDATION_POLICY_TYPE_UNKNOWN",
                "Policy type must be one of HEALTH, LIFE, VEHICLE, HOUSE, TRAVEL",
            )
            .with_details(format!("value={s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    RuleEngine,
    MlClassifier,
}

/// Outcome of the rule-first, model-fallback decision.
///
/// `probabilities` is `None` exactly when `source` is [`DecisionSource::RuleEngine`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HybridPrediction {
    pub tier: Tier,
    pub source: DecisionSource,
    pub probabilities: Option<BTreeMap<Tier, f64>>,
}

impl HybridPrediction {
    pub fn from_rule(tier: Tier) -> Self {
        Self {
            tier,
            source: DecisionSource::RuleEngine,
            probabilities: None,
        }
    }
}

/// A non-fatal problem reported alongside a successful result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A single model input cell. `Missing` is the explicit absent marker; encoders decide how to
/// represent it, it is never silently turned into `0.0` here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    Number(f64),
    Category(String),
    Missing,
}

/// Feature row keyed by canonical feature name.
pub type FeatureRow = BTreeMap<String, FeatureValue>;

/// Lowercase and drop everything that is not an ASCII letter or digit.
///
/// Used to match feature names (`Sum Assured` == `sumassured`) and lookup keys
/// (`2-wheeler` == `2wheeler`).
pub fn canonical_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
