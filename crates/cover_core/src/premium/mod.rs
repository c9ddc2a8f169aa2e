//! Deterministic, policy-specific premium formulas. Amounts are in INR.
//!
//! Bucket boundaries and fallbacks here are contract-level: callers (and tests) rely on the
//! exact numbers.

use serde::{Deserialize, Serialize};

use crate::domain::{canonical_key, round_to};
use crate::profile::{PolicyDetails, TravelDetails, UserProfile};

/// Depreciation by vehicle age in whole years; index 5 covers every age from 5 up.
const VEHICLE_DEPRECIATION: [f64; 6] = [0.0, 0.15, 0.25, 0.35, 0.45, 0.50];

const VEHICLE_RATE_DEFAULT: f64 = 0.03;

const PROPERTY_BASE_RATE: f64 = 0.001;

/// (minimum age in years, multiplier), ascending.
const PROPERTY_AGE_STEPS: [(u32, f64); 5] = [(0, 1.0), (5, 1.1), (10, 1.2), (15, 1.3), (20, 1.4)];

const PROPERTY_TYPE_DEFAULT: f64 = 1.2;

pub const PROPERTY_SIZE_BASELINE_SQ_FT: f64 = 1000.0;

const TRAVEL_DAILY_RATE: f64 = 100.0;
const TRAVEL_MEDICAL_CONDITION_LOADING: f64 = 1.3;
const TRAVEL_CANCELLATION_LOADING: f64 = 1.2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VehicleQuote {
    /// Insured declared value: the depreciated price.
    pub idv: f64,
    pub premium: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PremiumEstimate {
    pub premium: f64,
    pub insured_value: Option<f64>,
}

pub fn vehicle_depreciation(age_years: u32) -> f64 {
    let idx = (age_years as usize).min(VEHICLE_DEPRECIATION.len() - 1);
    VEHICLE_DEPRECIATION[idx]
}

/// Rate applied to the IDV. Unknown types price as a car.
pub fn vehicle_rate(vehicle_type: &str) -> f64 {
    match canonical_key(vehicle_type).as_str() {
        "2wheeler" | "twowheeler" => 0.02,
        "car" => 0.03,
        "luxury" => 0.035,
        "commercial" => 0.04,
        _ => VEHICLE_RATE_DEFAULT,
    }
}

pub fn vehicle_premium(price: f64, age_years: u32, vehicle_type: &str) -> VehicleQuote {
    let idv = price * (1.0 - vehicle_depreciation(age_years));
    VehicleQuote {
        idv,
        premium: idv * vehicle_rate(vehicle_type),
    }
}

/// Multiplier of the highest age step not above `age_years`.
pub fn property_age_multiplier(age_years: u32) -> f64 {
    PROPERTY_AGE_STEPS
        .iter()
        .rev()
        .find(|(threshold, _)| age_years >= *threshold)
        .map(|(_, mult)| *mult)
        .unwrap_or(1.0)
}

pub fn property_type_multiplier(property_type: &str) -> f64 {
    match canonical_key(property_type).as_str() {
        "apartment" => 1.0,
        "house" => 1.2,
        "villa" => 1.4,
        "commercial" => 1.5,
        _ => PROPERTY_TYPE_DEFAULT,
    }
}

/// +5% per 1000 sq ft above the first 1000; never below 1.0.
pub fn property_size_multiplier(size_sq_ft: f64) -> f64 {
    1.0 + ((size_sq_ft - PROPERTY_SIZE_BASELINE_SQ_FT) / 1000.0).max(0.0) * 0.05
}

pub fn property_premium(value: f64, age_years: u32, property_type: &str, size_sq_ft: f64) -> f64 {
    let premium = value
        * PROPERTY_BASE_RATE
        * property_age_multiplier(age_years)
        * property_type_multiplier(property_type)
        * property_size_multiplier(size_sq_ft);
    round_to(premium, 2)
}

fn health_coverage_multiplier(level: &str) -> f64 {
    match canonical_key(level).as_str() {
        "standard" => 1.2,
        "gold" => 1.5,
        "premium" => 2.0,
        _ => 1.0,
    }
}

fn baggage_coverage_multiplier(level: &str) -> f64 {
    match canonical_key(level).as_str() {
        "standard" => 1.1,
        "gold" => 1.3,
        "premium" => 1.5,
        _ => 1.0,
    }
}

fn accident_coverage_multiplier(level: &str) -> f64 {
    match canonical_key(level).as_str() {
        "standard" => 1.2,
        "gold" => 1.4,
        "premium" => 1.6,
        _ => 1.0,
    }
}

/// `None` when the trip duration is unknown.
pub fn travel_premium(trip: &TravelDetails) -> Option<f64> {
    let days = trip.trip_duration_days?;
    let mut premium = f64::from(days) * TRAVEL_DAILY_RATE;
    premium *= health_coverage_multiplier(&trip.health_coverage);
    premium *= baggage_coverage_multiplier(&trip.baggage_coverage);
    premium *= accident_coverage_multiplier(&trip.accident_coverage);
    if trip.existing_medical_condition {
        premium *= TRAVEL_MEDICAL_CONDITION_LOADING;
    }
    if trip.trip_cancellation {
        premium *= TRAVEL_CANCELLATION_LOADING;
    }
    Some(premium)
}

/// Formula-based estimate for the policy types that have one. Health and life premiums come
/// from the trained regressor only.
pub fn estimate(profile: &UserProfile) -> Option<PremiumEstimate> {
    match &profile.details {
        PolicyDetails::Vehicle(v) => {
            let quote = vehicle_premium(v.price?, v.vehicle_age?, &v.vehicle_type);
            Some(PremiumEstimate {
                premium: round_to(quote.premium, 2),
                insured_value: Some(round_to(quote.idv, 2)),
            })
        }
        PolicyDetails::House(p) => {
            let value = p.value?;
            Some(PremiumEstimate {
                premium: property_premium(
                    value,
                    p.property_age.unwrap_or(0),
                    &p.property_type,
                    p.size_sq_ft.unwrap_or(PROPERTY_SIZE_BASELINE_SQ_FT),
                ),
                insured_value: Some(value),
            })
        }
        PolicyDetails::Travel(t) => Some(PremiumEstimate {
            premium: round_to(travel_premium(t)?, 2),
            insured_value: t.sum_insured,
        }),
        PolicyDetails::Health(_) | PolicyDetails::Life(_) => None,
    }
}
