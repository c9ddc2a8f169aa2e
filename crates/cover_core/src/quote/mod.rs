use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{round_to, Country, FeatureValue, Tier};
use crate::error::AppError;
use crate::model::ModelBundle;
use crate::profile::UserProfile;

/// Fixed tier scaling used when the regressor has no tier column.
pub fn tier_multiplier(tier: Tier) -> f64 {
    match tier {
        Tier::Basic => 0.90,
        Tier::Standard => 1.00,
        Tier::Gold => 1.20,
        Tier::Premium => 1.45,
    }
}

pub const INR_PER_AUD: f64 = 55.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierQuote {
    pub currency: String,
    pub premiums: BTreeMap<Tier, f64>,
    /// True when premiums came from one regressor call per tier.
    pub per_tier_regression: bool,
}

/// Annual premium for every tier, in the profile country's currency.
pub fn quote_tiers(profile: &UserProfile, bundle: &ModelBundle) -> Result<TierQuote, AppError> {
    let row = profile.feature_row();
    let mut premiums_inr = BTreeMap::new();

    let per_tier_regression = match &bundle.regressor.tier_feature {
        Some(tier_feature) => {
            for tier in Tier::ALL {
                let mut with_tier = row.clone();
                with_tier.insert(
                    tier_feature.clone(),
                    FeatureValue::Category(tier.as_str().to_string()),
                );
                premiums_inr.insert(tier, round_to(bundle.predict_premium(&with_tier)?, 2));
            }
            true
        }
        None => {
            let base = bundle.predict_premium(&row)?;
            for tier in Tier::ALL {
                premiums_inr.insert(tier, round_to(base * tier_multiplier(tier), 2));
            }
            false
        }
    };

    let (currency, premiums) = convert_for_country(profile.country, premiums_inr);
    Ok(TierQuote {
        currency: currency.to_string(),
        premiums,
        per_tier_regression,
    })
}

pub fn convert_for_country(
    country: Country,
    premiums_inr: BTreeMap<Tier, f64>,
) -> (&'static str, BTreeMap<Tier, f64>) {
    match country {
        Country::India => ("INR", premiums_inr),
        Country::Australia => (
            "AUD",
            premiums_inr
                .into_iter()
                .map(|(tier, v)| (tier, round_to(v / INR_PER_AUD, 2)))
                .collect(),
        ),
    }
}
