use cover_core::premium::{
    estimate, property_premium, property_type_multiplier, travel_premium, vehicle_premium,
    vehicle_rate,
};
use cover_core::profile::{normalize_profile, ProfileInput, TravelDetails};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn vehicle_car_two_years_old() {
    let quote = vehicle_premium(1_000_000.0, 2, "car");
    assert!(close(quote.idv, 750_000.0), "idv={}", quote.idv);
    assert!(close(quote.premium, 22_500.0), "premium={}", quote.premium);
}

#[test]
fn vehicle_type_keys_are_canonicalized() {
    assert_eq!(vehicle_rate("2-wheeler"), 0.02);
    assert_eq!(vehicle_rate("2 Wheeler"), 0.02);
    assert_eq!(vehicle_rate("LUXURY"), 0.035);
    assert_eq!(vehicle_rate("tractor"), vehicle_rate("car"));
}

#[test]
fn villa_twelve_years_fifteen_hundred_sq_ft() {
    // 5,000,000 x 0.001 x 1.2 (age) x 1.4 (villa) x 1.025 (size)
    let premium = property_premium(5_000_000.0, 12, "villa", 1_500.0);
    assert!(close(premium, 8_610.0), "premium={premium}");
}

#[test]
fn unknown_property_type_uses_house_multiplier() {
    assert_eq!(property_type_multiplier("bungalow"), 1.2);
    assert_eq!(property_type_multiplier("house"), 1.2);
}

#[test]
fn travel_applies_multipliers_in_sequence() {
    let trip = TravelDetails {
        trip_duration_days: Some(10),
        existing_medical_condition: true,
        health_coverage: "gold".to_string(),
        baggage_coverage: "standard".to_string(),
        accident_coverage: "unknown-level".to_string(),
        trip_cancellation: true,
        ..Default::default()
    };
    // 10 x 100 x 1.5 x 1.1 x 1.0 x 1.3 x 1.2
    let premium = travel_premium(&trip).expect("duration is set");
    assert!(close(premium, 2_574.0), "premium={premium}");

    let no_duration = TravelDetails::default();
    assert_eq!(travel_premium(&no_duration), None);
}

#[test]
fn estimate_is_only_formula_based() {
    let vehicle = normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("vehicle".to_string()),
        vehicle_price: Some(1_000_000.0),
        vehicle_age: Some(2.0),
        vehicle_type: Some("Car".to_string()),
        ..Default::default()
    })
    .expect("normalize");
    let est = estimate(&vehicle).expect("vehicle estimate");
    assert!(close(est.premium, 22_500.0));
    assert_eq!(est.insured_value, Some(750_000.0));

    let health = normalize_profile(&ProfileInput {
        country: Some("IN".to_string()),
        policy_type: Some("health".to_string()),
        age: Some(30.0),
        sum_insured: Some(500_000.0),
        ..Default::default()
    })
    .expect("normalize");
    assert!(estimate(&health).is_none());
}
