use crate::domain::{canonical_key, Tier};
use crate::error::AppError;
use crate::profile::{HealthDetails, PolicyDetails, PropertyDetails, TravelDetails, UserProfile, VehicleDetails};

const HEALTH_TOP_SUM_INSURED: f64 = 5_000_000.0;
const HEALTH_SENIOR_AGE: u32 = 60;
const HEALTH_MIDLIFE_AGE: u32 = 50;
const HEALTH_MIDLIFE_SUM_INSURED: f64 = 1_000_000.0;
const HEALTH_YOUNG_AGE: u32 = 30;
const HEALTH_ENTRY_SUM_INSURED: f64 = 300_000.0;

const VEHICLE_TOP_PRICE: f64 = 3_000_000.0;
const VEHICLE_OLD_AGE: u32 = 10;
const VEHICLE_ENTRY_TWO_WHEELER_PRICE: f64 = 100_000.0;

const HOUSE_TOP_VALUE: f64 = 20_000_000.0;
const HOUSE_VILLA_VALUE: f64 = 10_000_000.0;
const HOUSE_ENTRY_VALUE: f64 = 1_000_000.0;

const TRAVEL_LONG_TRIP_WITH_CONDITION_DAYS: u32 = 30;
const TRAVEL_EXTENDED_TRIP_DAYS: u32 = 90;
const TRAVEL_SHORT_TRIP_DAYS: u32 = 7;

/// Deterministic tier decision. `Ok(None)` means no rule fired and the caller should fall back
/// to the model; an error means the profile lacks a field its policy type needs.
pub fn apply_rules(profile: &UserProfile) -> Result<Option<Tier>, AppError> {
    match &profile.details {
        PolicyDetails::Health(h) | PolicyDetails::Life(h) => health_rules(profile.age, h),
        PolicyDetails::Vehicle(v) => vehicle_rules(v),
        PolicyDetails::House(p) => house_rules(p),
        PolicyDetails::Travel(t) => travel_rules(t),
    }
}

fn health_rules(age: Option<u32>, h: &HealthDetails) -> Result<Option<Tier>, AppError> {
    let age = require(age, "age")?;
    let sum_insured = require(h.sum_insured, "sum_insured")?;
    let smoker = h.smoker == Some(true);
    let no_issues = h.health_issues.as_ref().map(Vec::is_empty).unwrap_or(true);

    if sum_insured >= HEALTH_TOP_SUM_INSURED {
        return Ok(Some(Tier::Premium));
    }
    if age >= HEALTH_SENIOR_AGE && smoker {
        return Ok(Some(Tier::Premium));
    }
    if age >= HEALTH_MIDLIFE_AGE && sum_insured >= HEALTH_MIDLIFE_SUM_INSURED {
        return Ok(Some(Tier::Gold));
    }
    if age < HEALTH_YOUNG_AGE && sum_insured <= HEALTH_ENTRY_SUM_INSURED && !smoker && no_issues {
        return Ok(Some(Tier::Basic));
    }
    Ok(None)
}

fn vehicle_rules(v: &VehicleDetails) -> Result<Option<Tier>, AppError> {
    let price = require(v.price, "vehicle_price")?;
    let age = require(v.vehicle_age, "vehicle_age")?;
    let kind = canonical_key(&v.vehicle_type);

    if kind == "luxury" || price >= VEHICLE_TOP_PRICE {
        return Ok(Some(Tier::Premium));
    }
    if kind == "commercial" {
        return Ok(Some(Tier::Gold));
    }
    if age >= VEHICLE_OLD_AGE {
        return Ok(Some(Tier::Basic));
    }
    if kind == "2wheeler" && price <= VEHICLE_ENTRY_TWO_WHEELER_PRICE {
        return Ok(Some(Tier::Basic));
    }
    Ok(None)
}

fn house_rules(p: &PropertyDetails) -> Result<Option<Tier>, AppError> {
    let value = require(p.value, "property_value")?;

    if value >= HOUSE_TOP_VALUE {
        return Ok(Some(Tier::Premium));
    }
    if canonical_key(&p.property_type) == "villa" && value >= HOUSE_VILLA_VALUE {
        return Ok(Some(Tier::Gold));
    }
    if value <= HOUSE_ENTRY_VALUE {
        return Ok(Some(Tier::Basic));
    }
    Ok(None)
}

fn travel_rules(t: &TravelDetails) -> Result<Option<Tier>, AppError> {
    let days = require(t.trip_duration_days, "trip_duration_days")?;

    if days >= TRAVEL_LONG_TRIP_WITH_CONDITION_DAYS && t.existing_medical_condition {
        return Ok(Some(Tier::Premium));
    }
    if days >= TRAVEL_EXTENDED_TRIP_DAYS {
        return Ok(Some(Tier::Gold));
    }
    if days <= TRAVEL_SHORT_TRIP_DAYS && !t.existing_medical_condition && !t.trip_cancellation {
        return Ok(Some(Tier::Basic));
    }
    Ok(None)
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| {
        AppError::new(
            "VALIDATION_RULE_INPUT_MISSING",
            format!("{field} is required for this policy type"),
        )
        .with_details(format!("field={field}"))
    })
}
