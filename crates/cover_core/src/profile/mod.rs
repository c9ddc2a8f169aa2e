//! User profile input shapes and normalization.
//!
//! `ProfileInput` mirrors what callers send (every field optional, several historical
//! spellings accepted). `normalize_profile` turns it into a typed `UserProfile` or rejects it
//! with a `VALIDATION_*` error. Policy-specific completeness (for example a health profile
//! without a sum insured) is left to the rule engine, which knows which fields it needs.

use serde::{Deserialize, Serialize};

use crate::domain::{canonical_key, Country, FeatureRow, FeatureValue, PolicyType};
use crate::error::AppError;
use crate::premium;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileInput {
    #[serde(alias = "Country")]
    pub country: Option<String>,
    #[serde(alias = "ProductType", alias = "policytype", alias = "PolicyType")]
    pub policy_type: Option<String>,
    #[serde(alias = "Language")]
    pub language: Option<String>,
    #[serde(alias = "Name")]
    pub name: Option<String>,
    #[serde(alias = "Age")]
    pub age: Option<f64>,

    #[serde(alias = "SumInsured", alias = "sumassured", alias = "SumAssured")]
    pub sum_insured: Option<f64>,
    #[serde(alias = "AnnualPremium", alias = "annualpremium")]
    pub annual_premium: Option<f64>,
    #[serde(alias = "SmokerDrinker", alias = "smokerdrinker")]
    pub smoker: Option<String>,
    #[serde(alias = "HealthIssues", alias = "diseases", alias = "Diseases")]
    pub health_issues: Option<String>,

    #[serde(alias = "PriceOfVehicle", alias = "priceofvehicle")]
    pub vehicle_price: Option<f64>,
    #[serde(alias = "AgeOfVehicle", alias = "ageofvehicle")]
    pub vehicle_age: Option<f64>,
    #[serde(alias = "TypeOfVehicle", alias = "typeofvehicle")]
    pub vehicle_type: Option<String>,

    #[serde(alias = "PropertyValue", alias = "propertyvalue")]
    pub property_value: Option<f64>,
    #[serde(alias = "PropertyAge", alias = "propertyage")]
    pub property_age: Option<f64>,
    #[serde(alias = "PropertyType", alias = "propertytype")]
    pub property_type: Option<String>,
    #[serde(alias = "PropertySizeSqFeet", alias = "propertysizesqfeet")]
    pub property_size_sq_ft: Option<f64>,

    #[serde(alias = "DestinationCountry", alias = "destinationcountry")]
    pub destination_country: Option<String>,
    #[serde(alias = "TripDurationDays", alias = "tripdurationdays")]
    pub trip_duration_days: Option<f64>,
    #[serde(alias = "ExistingMedicalCondition", alias = "existingmedicalcondition")]
    pub existing_medical_condition: Option<String>,
    #[serde(alias = "HealthCoverage", alias = "healthcoverage")]
    pub health_coverage: Option<String>,
    #[serde(alias = "BaggageCoverage", alias = "baggagecoverage")]
    pub baggage_coverage: Option<String>,
    #[serde(alias = "TripCancellationCoverage", alias = "tripcancellationcoverage")]
    pub trip_cancellation_coverage: Option<String>,
    #[serde(alias = "AccidentCoverage", alias = "accidentcoverage")]
    pub accident_coverage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub country: Country,
    pub language: String,
    pub details: PolicyDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy_type", rename_all = "snake_case")]
pub enum PolicyDetails {
    Health(HealthDetails),
    Life(HealthDetails),
    Vehicle(VehicleDetails),
    House(PropertyDetails),
    Travel(TravelDetails),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthDetails {
    pub sum_insured: Option<f64>,
    pub annual_premium: Option<f64>,
    pub smoker: Option<bool>,
    /// `None` when the caller did not say; `Some(vec![])` when they declared no issues.
    pub health_issues: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VehicleDetails {
    pub price: Option<f64>,
    pub vehicle_age: Option<u32>,
    /// Canonical key (`car`, `2wheeler`, `luxury`, `commercial`, or whatever was sent).
    pub vehicle_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyDetails {
    pub value: Option<f64>,
    pub property_age: Option<u32>,
    pub property_type: String,
    pub size_sq_ft: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TravelDetails {
    pub destination_country: Option<String>,
    pub trip_duration_days: Option<u32>,
    pub existing_medical_condition: bool,
    pub health_coverage: String,
    pub baggage_coverage: String,
    pub accident_coverage: String,
    pub trip_cancellation: bool,
    pub sum_insured: Option<f64>,
}

impl UserProfile {
    pub fn policy_type(&self) -> PolicyType {
        match &self.details {
            PolicyDetails::Health(_) => PolicyType::Health,
            PolicyDetails::Life(_) => PolicyType::Life,
            PolicyDetails::Vehicle(_) => PolicyType::Vehicle,
            PolicyDetails::House(_) => PolicyType::House,
            PolicyDetails::Travel(_) => PolicyType::Travel,
        }
    }

    /// Smoker status only exists on health and life profiles.
    pub fn is_smoker(&self) -> bool {
        match &self.details {
            PolicyDetails::Health(h) | PolicyDetails::Life(h) => h.smoker == Some(true),
            _ => false,
        }
    }

    pub fn health_issues(&self) -> &[String] {
        match &self.details {
            PolicyDetails::Health(h) | PolicyDetails::Life(h) => {
                h.health_issues.as_deref().unwrap_or(&[])
            }
            _ => &[],
        }
    }

    pub fn trip_duration_days(&self) -> Option<u32> {
        match &self.details {
            PolicyDetails::Travel(t) => t.trip_duration_days,
            _ => None,
        }
    }

    /// Model input row with canonical feature names. Derived amounts (IDV, calculated
    /// premiums) are included so models trained on the standardized dataset see the same
    /// columns; anything the profile does not carry is `FeatureValue::Missing`.
    pub fn feature_row(&self) -> FeatureRow {
        let mut row = FeatureRow::new();
        row.insert("age".to_string(), number(self.age.map(f64::from)));
        row.insert(
            "country".to_string(),
            FeatureValue::Category(self.country.as_str().to_string()),
        );
        row.insert(
            "policytype".to_string(),
            FeatureValue::Category(self.policy_type().as_str().to_string()),
        );

        match &self.details {
            PolicyDetails::Health(h) | PolicyDetails::Life(h) => {
                row.insert("sumassured".to_string(), number(h.sum_insured));
                row.insert("annualpremium".to_string(), number(h.annual_premium));
                row.insert(
                    "smokerdrinker".to_string(),
                    match h.smoker {
                        Some(true) => FeatureValue::Category("yes".to_string()),
                        Some(false) => FeatureValue::Category("no".to_string()),
                        None => FeatureValue::Missing,
                    },
                );
                row.insert(
                    "diseases".to_string(),
                    match &h.health_issues {
                        Some(issues) if issues.is_empty() => {
                            FeatureValue::Category("none".to_string())
                        }
                        Some(issues) => FeatureValue::Category(issues.join(",")),
                        None => FeatureValue::Missing,
                    },
                );
            }
            PolicyDetails::Vehicle(v) => {
                row.insert("priceofvehicle".to_string(), number(v.price));
                row.insert(
                    "ageofvehicle".to_string(),
                    number(v.vehicle_age.map(f64::from)),
                );
                row.insert(
                    "typeofvehicle".to_string(),
                    FeatureValue::Category(v.vehicle_type.clone()),
                );
                let quote = match (v.price, v.vehicle_age) {
                    (Some(price), Some(age)) => {
                        Some(premium::vehicle_premium(price, age, &v.vehicle_type))
                    }
                    _ => None,
                };
                row.insert("sumassured".to_string(), number(quote.map(|q| q.idv)));
                row.insert(
                    "annualpremium".to_string(),
                    number(quote.map(|q| q.premium)),
                );
            }
            PolicyDetails::House(p) => {
                row.insert("propertyvalue".to_string(), number(p.value));
                row.insert(
                    "propertyage".to_string(),
                    number(p.property_age.map(f64::from)),
                );
                row.insert(
                    "propertytype".to_string(),
                    FeatureValue::Category(p.property_type.clone()),
                );
                row.insert("propertysize".to_string(), number(p.size_sq_ft));
                row.insert("sumassured".to_string(), number(p.value));
                let annual = p.value.map(|value| {
                    premium::property_premium(
                        value,
                        p.property_age.unwrap_or(0),
                        &p.property_type,
                        p.size_sq_ft.unwrap_or(premium::PROPERTY_SIZE_BASELINE_SQ_FT),
                    )
                });
                row.insert("annualpremium".to_string(), number(annual));
            }
            PolicyDetails::Travel(t) => {
                row.insert(
                    "destinationcountry".to_string(),
                    match &t.destination_country {
                        Some(d) => FeatureValue::Category(d.to_lowercase()),
                        None => FeatureValue::Missing,
                    },
                );
                row.insert(
                    "tripdurationdays".to_string(),
                    number(t.trip_duration_days.map(f64::from)),
                );
                row.insert(
                    "existingmedicalcondition".to_string(),
                    FeatureValue::Category(yes_no(t.existing_medical_condition)),
                );
                row.insert(
                    "healthcoverage".to_string(),
                    FeatureValue::Category(t.health_coverage.clone()),
                );
                row.insert(
                    "baggagecoverage".to_string(),
                    FeatureValue::Category(t.baggage_coverage.clone()),
                );
                row.insert(
                    "accidentcoverage".to_string(),
                    FeatureValue::Category(t.accident_coverage.clone()),
                );
                row.insert(
                    "tripcancellationcoverage".to_string(),
                    FeatureValue::Category(yes_no(t.trip_cancellation)),
                );
                row.insert("sumassured".to_string(), number(t.sum_insured));
                row.insert(
                    "trippremium".to_string(),
                    number(premium::travel_premium(t)),
                );
            }
        }
        row
    }

    /// Human-readable summary of the filled fields only.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = &self.name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(age) = self.age {
            lines.push(format!("Age: {age}"));
        }
        lines.push(format!("Country: {}", self.country.display_name()));
        lines.push(format!("Language: {}", self.language));
        lines.push(format!("ProductType: {}", self.policy_type().display_name()));

        match &self.details {
            PolicyDetails::Health(h) | PolicyDetails::Life(h) => {
                push_amount(&mut lines, "SumInsured", h.sum_insured);
                push_amount(&mut lines, "AnnualPremium", h.annual_premium);
                if let Some(smoker) = h.smoker {
                    lines.push(format!("SmokerDrinker: {}", yes_no_title(smoker)));
                }
                if let Some(issues) = &h.health_issues {
                    if !issues.is_empty() {
                        lines.push(format!("HealthIssues: {}", issues.join(", ")));
                    }
                }
            }
            PolicyDetails::Vehicle(v) => {
                push_amount(&mut lines, "PriceOfVehicle", v.price);
                if let Some(age) = v.vehicle_age {
                    lines.push(format!("AgeOfVehicle: {age}"));
                }
                lines.push(format!("TypeOfVehicle: {}", v.vehicle_type));
            }
            PolicyDetails::House(p) => {
                push_amount(&mut lines, "PropertyValue", p.value);
                if let Some(age) = p.property_age {
                    lines.push(format!("PropertyAge: {age}"));
                }
                lines.push(format!("PropertyType: {}", p.property_type));
                push_amount(&mut lines, "PropertySizeSqFeet", p.size_sq_ft);
            }
            PolicyDetails::Travel(t) => {
                if let Some(dest) = &t.destination_country {
                    lines.push(format!("DestinationCountry: {dest}"));
                }
                if let Some(days) = t.trip_duration_days {
                    lines.push(format!("TripDurationDays: {days}"));
                }
                lines.push(format!(
                    "ExistingMedicalCondition: {}",
                    yes_no_title(t.existing_medical_condition)
                ));
                lines.push(format!("HealthCoverage: {}", t.health_coverage));
                lines.push(format!("BaggageCoverage: {}", t.baggage_coverage));
                lines.push(format!("AccidentCoverage: {}", t.accident_coverage));
                lines.push(format!(
                    "TripCancellationCoverage: {}",
                    yes_no_title(t.trip_cancellation)
                ));
                push_amount(&mut lines, "SumInsured", t.sum_insured);
            }
        }
        lines
    }
}

pub fn normalize_profile(input: &ProfileInput) -> Result<UserProfile, AppError> {
    let country: Country = required_text(&input.country, "country")?.parse()?;
    let policy_type: PolicyType = required_text(&input.policy_type, "policy_type")?.parse()?;

    let language = clean_text(&input.language).unwrap_or_else(|| "English".to_string());
    let age = whole_number(input.age, "age")?;

    let details = match policy_type {
        PolicyType::Health | PolicyType::Life => {
            let health = HealthDetails {
                sum_insured: amount(input.sum_insured, "sum_insured")?,
                annual_premium: amount(input.annual_premium, "annual_premium")?,
                smoker: match clean_text(&input.smoker) {
                    Some(raw) => Some(parse_yes_no(&raw, "smoker")?),
                    None => None,
                },
                health_issues: input.health_issues.as_deref().map(split_health_issues),
            };
            if policy_type == PolicyType::Health {
                PolicyDetails::Health(health)
            } else {
                PolicyDetails::Life(health)
            }
        }
        PolicyType::Vehicle => PolicyDetails::Vehicle(VehicleDetails {
            price: amount(input.vehicle_price, "vehicle_price")?,
            vehicle_age: whole_number(input.vehicle_age, "vehicle_age")?,
            vehicle_type: clean_text(&input.vehicle_type)
                .map(|t| canonical_key(&t))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "car".to_string()),
        }),
        PolicyType::House => PolicyDetails::House(PropertyDetails {
            value: amount(input.property_value, "property_value")?,
            property_age: whole_number(input.property_age, "property_age")?,
            property_type: clean_text(&input.property_type)
                .map(|t| canonical_key(&t))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "house".to_string()),
            size_sq_ft: amount(input.property_size_sq_ft, "property_size_sq_ft")?,
        }),
        PolicyType::Travel => PolicyDetails::Travel(TravelDetails {
            destination_country: clean_text(&input.destination_country),
            trip_duration_days: whole_number(input.trip_duration_days, "trip_duration_days")?,
            existing_medical_condition: optional_yes_no(
                &input.existing_medical_condition,
                "existing_medical_condition",
            )?,
            health_coverage: coverage_level(&input.health_coverage),
            baggage_coverage: coverage_level(&input.baggage_coverage),
            accident_coverage: coverage_level(&input.accident_coverage),
            trip_cancellation: optional_yes_no(
                &input.trip_cancellation_coverage,
                "trip_cancellation_coverage",
            )?,
            sum_insured: amount(input.sum_insured, "sum_insured")?,
        }),
    };

    Ok(UserProfile {
        name: clean_text(&input.name),
        age,
        country,
        language,
        details,
    })
}

fn required_text(value: &Option<String>, field: &str) -> Result<String, AppError> {
    clean_text(value).ok_or_else(|| {
        AppError::new("VALIDATION_FIELD_REQUIRED", format!("{field} is required"))
            .with_details(format!("field={field}"))
    })
}

/// Blank and `NA`-style placeholders count as absent.
fn clean_text(value: &Option<String>) -> Option<String> {
    let s = value.as_deref()?.trim();
    match s.to_ascii_lowercase().as_str() {
        "" | "na" | "n/a" | "nan" | "none" | "null" => None,
        _ => Some(s.to_string()),
    }
}

fn amount(value: Option<f64>, field: &str) -> Result<Option<f64>, AppError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        Some(v) => Err(AppError::new(
            "VALIDATION_NUMBER_INVALID",
            format!("{field} must be a finite, non-negative number"),
        )
        .with_details(format!("field={field}; value={v}"))),
    }
}

fn whole_number(value: Option<f64>, field: &str) -> Result<Option<u32>, AppError> {
    match amount(value, field)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && v <= f64::from(u32::MAX) => Ok(Some(v as u32)),
        Some(v) => Err(AppError::new(
            "VALIDATION_NUMBER_INVALID",
            format!("{field} must be a whole number"),
        )
        .with_details(format!("field={field}; value={v}"))),
    }
}

fn parse_yes_no(raw: &str, field: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        _ => Err(
            AppError::new("VALIDATION_FLAG_INVALID", format!("{field} must be Yes or No"))
                .with_details(format!("field={field}; value={raw}")),
        ),
    }
}

fn optional_yes_no(value: &Option<String>, field: &str) -> Result<bool, AppError> {
    match clean_text(value) {
        Some(raw) => parse_yes_no(&raw, field),
        None => Ok(false),
    }
}

fn coverage_level(value: &Option<String>) -> String {
    clean_text(value)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "basic".to_string())
}

fn split_health_issues(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !matches!(s.as_str(), "" | "na" | "nan" | "none" | "no"))
        .collect()
}

fn number(value: Option<f64>) -> FeatureValue {
    match value {
        Some(v) => FeatureValue::Number(v),
        None => FeatureValue::Missing,
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

fn yes_no_title(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn push_amount(lines: &mut Vec<String>, label: &str, value: Option<f64>) {
    if let Some(v) = value {
        lines.push(format!("{label}: {v}"));
    }
}
