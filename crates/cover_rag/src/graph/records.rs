//! Tabular policy dataset → graph. One `Policy` node per row, linked to its holder, home
//! country, covered diseases or assets, and trip. Attribute nodes are shared by natural key
//! and their properties follow the latest row written.

use cover_core::domain::{canonical_key, ValidationWarning};
use cover_core::error::AppError;
use rusqlite::Connection;
use serde_json::json;
use tracing::warn;

use super::ingest::{run_batches, IngestOptions, IngestSummary};
use super::store::{link, upsert_node, GraphStore, OnMatch};
use super::{
    LABEL_COUNTRY, LABEL_DISEASE, LABEL_HOUSE, LABEL_POLICY, LABEL_TRIP, LABEL_USER,
    LABEL_VEHICLE, REL_APPLICABLE_IN, REL_COVERS, REL_DESTINATION, REL_HAS_TRIP, REL_HOLDS,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct PolicyRow {
    id: String,
    dataset: String,
    home_country: Option<String>,
    name: Option<String>,
    age: Option<String>,
    policy_type: Option<String>,
    policy_tier: Option<String>,
    sum_assured: Option<String>,
    annual_premium: Option<String>,
    smoker_drinker: Option<String>,
    diseases: Vec<String>,
    vehicle_price: Option<String>,
    vehicle_age: Option<String>,
    vehicle_type: Option<String>,
    property_value: Option<String>,
    property_age: Option<String>,
    property_type: Option<String>,
    property_size: Option<String>,
    destination_country: Option<String>,
    trip_duration: Option<String>,
    existing_medical_condition: Option<String>,
    health_coverage: Option<String>,
    baggage_coverage: Option<String>,
    trip_cancellation: Option<String>,
    accident_coverage: Option<String>,
    trip_premium: Option<String>,
}

impl PolicyRow {
    fn has_user(&self) -> bool {
        self.name.is_some() || self.age.is_some() || self.smoker_drinker.is_some()
    }

    fn has_vehicle(&self) -> bool {
        self.vehicle_price.is_some() || self.vehicle_type.is_some() || self.vehicle_age.is_some()
    }

    fn has_house(&self) -> bool {
        self.property_value.is_some()
            || self.property_type.is_some()
            || self.property_age.is_some()
            || self.property_size.is_some()
    }

    fn has_trip(&self) -> bool {
        self.destination_country.is_some()
            || self.trip_duration.is_some()
            || self.trip_premium.is_some()
    }
}

#[derive(Debug, Default)]
struct ParsedRows {
    rows: Vec<PolicyRow>,
    skipped: usize,
    warnings: Vec<ValidationWarning>,
}

/// Ingest a policy dataset CSV. Rows are keyed `"{dataset}_{row}"` (zero-based data row), so
/// re-running the same file updates nodes in place. Unreadable rows are skipped and reported
/// in the summary's `skipped` and `warnings`.
pub fn ingest_policy_records(
    store: &mut GraphStore,
    csv_text: &str,
    dataset: &str,
    opts: &IngestOptions,
) -> Result<IngestSummary, AppError> {
    let parsed = parse_policy_rows(csv_text, dataset)?;
    if parsed.skipped > 0 {
        warn!(dataset, skipped = parsed.skipped, "policy rows left out");
    }
    let mut summary = run_batches(
        store,
        parsed.rows,
        opts,
        "policy_records",
        policy_key,
        write_policy_batch,
    )?;
    summary.skipped = parsed.skipped;
    summary.warnings = parsed.warnings;
    Ok(summary)
}

fn policy_key(row: &PolicyRow) -> &str {
    &row.id
}

fn parse_policy_rows(csv_text: &str, dataset: &str) -> Result<ParsedRows, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("INGEST_CSV_HEADERS_FAILED", "Failed to read policy CSV headers")
                .with_details(e.to_string())
        })?
        .clone();

    let mut parsed = ParsedRows::default();
    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                parsed.warnings.push(
                    ValidationWarning::new(
                        "INGEST_POLICY_CSV_PARSE_FAILED",
                        "Failed to parse policy CSV row",
                    )
                    .with_details(format!("row={idx}; err={e}")),
                );
                parsed.skipped += 1;
                continue;
            }
        };
        let cell = |column: &str| get(&record, &headers, column);

        parsed.rows.push(PolicyRow {
            id: format!("{dataset}_{idx}"),
            dataset: dataset.to_string(),
            home_country: cell("Country"),
            name: cell("Name"),
            age: cell("Age"),
            policy_type: cell("Policy Type"),
            policy_tier: cell("Policy Tier"),
            sum_assured: cell("Sum Assured"),
            annual_premium: cell("Annual Premium"),
            smoker_drinker: cell("SmokerDrinker"),
            diseases: cell("Diseases")
                .map(|raw| raw.split(',').filter_map(clean_value).collect())
                .unwrap_or_default(),
            vehicle_price: cell("PriceOfVehicle"),
            vehicle_age: cell("AgeOfVehicle"),
            vehicle_type: cell("TypeOfVehicle"),
            property_value: cell("PropertyValue"),
            property_age: cell("PropertyAge"),
            property_type: cell("PropertyType"),
            property_size: cell("PropertySizeSqFeet"),
            destination_country: cell("DestinationCountry"),
            trip_duration: cell("TripDurationDays"),
            existing_medical_condition: cell("ExistingMedicalCondition"),
            health_coverage: cell("HealthCoverage"),
            baggage_coverage: cell("BaggageCoverage"),
            trip_cancellation: cell("TripCancellationCoverage"),
            accident_coverage: cell("AccidentCoverage"),
            trip_premium: cell("TripPremium"),
        });
    }
    Ok(parsed)
}

/// Header lookup ignores case, spaces and punctuation.
fn get(row: &csv::StringRecord, headers: &csv::StringRecord, column: &str) -> Option<String> {
    let wanted = canonical_key(column);
    headers
        .iter()
        .position(|h| canonical_key(h) == wanted)
        .and_then(|idx| row.get(idx))
        .and_then(clean_value)
}

/// Blank and `nan`/`na`/`none` cells are absent.
fn clean_value(raw: &str) -> Option<String> {
    let s = raw.trim();
    match s.to_ascii_lowercase().as_str() {
        "" | "nan" | "na" | "none" => None,
        _ => Some(s.to_string()),
    }
}

fn write_policy_batch(conn: &Connection, batch: &[PolicyRow]) -> Result<(), AppError> {
    for row in batch {
        let policy = upsert_node(
            conn,
            LABEL_POLICY,
            &row.id,
            None,
            &json!({
                "country": row.dataset,
                "policytype": row.policy_type,
                "policy_tier": row.policy_tier,
                "sumassured": row.sum_assured,
                "annual_premium": row.annual_premium,
            }),
            OnMatch::Merge,
        )?;

        if let Some(country) = &row.home_country {
            let c = upsert_node(conn, LABEL_COUNTRY, country, Some(country.as_str()), &json!({}), OnMatch::Merge)?;
            link(conn, policy, REL_APPLICABLE_IN, c)?;
        }

        if row.has_user() {
            let key = row.name.as_deref().unwrap_or(&row.id);
            let user = upsert_node(
                conn,
                LABEL_USER,
                key,
                Some(key),
                &json!({
                    "country": row.home_country,
                    "age": row.age,
                    "smokerdrinker": row.smoker_drinker,
                }),
                OnMatch::Merge,
            )?;
            link(conn, user, REL_HOLDS, policy)?;
        }

        for disease in &row.diseases {
            let d = upsert_node(conn, LABEL_DISEASE, disease, Some(disease.as_str()), &json!({}), OnMatch::Merge)?;
            link(conn, policy, REL_COVERS, d)?;
        }

        if row.has_vehicle() {
            let kind = row.vehicle_type.as_deref().unwrap_or("Unknown");
            let v = upsert_node(
                conn,
                LABEL_VEHICLE,
                kind,
                Some(kind),
                &json!({ "price": row.vehicle_price, "age": row.vehicle_age }),
                OnMatch::Merge,
            )?;
            link(conn, policy, REL_COVERS, v)?;
        }

        if row.has_house() {
            let kind = row.property_type.as_deref().unwrap_or("Unknown");
            let h = upsert_node(
                conn,
                LABEL_HOUSE,
                kind,
                Some(kind),
                &json!({
                    "value": row.property_value,
                    "age": row.property_age,
                    "size_sqft": row.property_size,
                }),
                OnMatch::Merge,
            )?;
            link(conn, policy, REL_COVERS, h)?;
        }

        if row.has_trip() {
            let duration = row.trip_duration.as_deref().unwrap_or("NA");
            let trip = upsert_node(
                conn,
                LABEL_TRIP,
                duration,
                None,
                &json!({
                    "duration": duration,
                    "existing_condition": row.existing_medical_condition,
                    "healthcoverage": row.health_coverage,
                    "baggagecoverage": row.baggage_coverage,
                    "trip_cancellation": row.trip_cancellation,
                    "accidentcoverage": row.accident_coverage,
                    "trippremium": row.trip_premium,
                }),
                OnMatch::Merge,
            )?;
            link(conn, policy, REL_HAS_TRIP, trip)?;

            if let Some(dest) = &row.destination_country {
                let c = upsert_node(conn, LABEL_COUNTRY, dest, Some(dest.as_str()), &json!({}), OnMatch::Merge)?;
                link(conn, trip, REL_DESTINATION, c)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_cells_are_absent() {
        assert_eq!(clean_value("  NaN "), None);
        assert_eq!(clean_value("none"), None);
        assert_eq!(clean_value(" Car "), Some("Car".to_string()));
    }

    #[test]
    fn diseases_split_and_drop_placeholders() {
        let csv = "Name,Country,Policy Type,Diseases\nAsha,India,Health,\"Diabetes, na ,Asthma\"\n";
        let rows = parse_policy_rows(csv, "india").expect("parse").rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "india_0");
        assert_eq!(rows[0].diseases, vec!["Diabetes".to_string(), "Asthma".to_string()]);
        assert_eq!(rows[0].vehicle_type, None);
    }

    #[test]
    fn short_row_is_reported_and_keeps_later_row_ids() {
        let csv = "Name,Country,Policy Type\nAsha,India,Health\nRavi,India\nMeera,India,Life\n";
        let parsed = parse_policy_rows(csv, "india").expect("parse");
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].code, "INGEST_POLICY_CSV_PARSE_FAILED");
        assert!(parsed.warnings[0]
            .details
            .as_deref()
            .is_some_and(|d| d.starts_with("row=1;")));
        let ids: Vec<&str> = parsed.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["india_0", "india_2"]);
    }
}
