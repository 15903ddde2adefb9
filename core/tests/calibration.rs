//! Calibration loading and validation.
//!
//! A malformed table must stop the run before any row is produced, and the
//! error must name the table and entry at fault.

use paysynth_core::{tables::DistributionTables, Calibration, GenError, Generator};

fn bundled() -> Calibration {
    Calibration::bundled().expect("bundled calibration")
}

fn calibration_error(result: Result<impl Sized, GenError>) -> (&'static str, String) {
    match result {
        Err(GenError::Calibration { table, key, .. }) => (table, key),
        Err(other) => panic!("expected a calibration error, got {other}"),
        Ok(_) => panic!("expected a calibration error, got Ok"),
    }
}

#[test]
fn bundled_calibration_is_valid() {
    let calibration = bundled();
    calibration.validate().unwrap();
    assert_eq!(calibration.categories.len(), 8);
    assert_eq!(calibration.geographies.len(), 8);
    assert_eq!(calibration.payment_methods.len(), 5);
    assert!(calibration.failure_codes.iter().any(|c| c.retryable));
    assert!(calibration.failure_codes.iter().any(|c| !c.retryable));
}

#[test]
fn json_round_trip_preserves_tables() {
    let calibration = bundled();
    let json = serde_json::to_string(&calibration).unwrap();
    let back = Calibration::from_json(&json).unwrap();
    assert_eq!(calibration, back);
}

#[test]
fn load_reads_a_file() {
    let path = std::env::temp_dir().join(format!("paysynth-calibration-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string_pretty(&bundled()).unwrap()).unwrap();
    let loaded = Calibration::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, bundled());
}

#[test]
fn missing_file_is_an_error() {
    let result = Calibration::load("/definitely/not/here/calibration.json");
    assert!(matches!(result, Err(GenError::Other(_))), "unexpected result {result:?}");
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let result = Calibration::from_json("{ \"version\": ");
    assert!(matches!(result, Err(GenError::Serialization(_))));
}

#[test]
fn negative_recovery_rate_is_rejected() {
    let mut calibration = bundled();
    calibration.failure_codes[0].recovery_rate = -0.1;
    let name = calibration.failure_codes[0].code.clone();

    let (table, key) = calibration_error(calibration.validate());
    assert_eq!(table, "failure_codes");
    assert_eq!(key, name);
}

#[test]
fn empty_enumeration_is_rejected() {
    let mut calibration = bundled();
    calibration.payment_methods.clear();
    let (table, _) = calibration_error(calibration.validate());
    assert_eq!(table, "payment_methods");
}

#[test]
fn zero_popularity_sum_is_rejected() {
    let mut calibration = bundled();
    for geo in &mut calibration.geographies {
        geo.popularity = 0.0;
    }
    let (table, _) = calibration_error(calibration.validate());
    assert_eq!(table, "geographies");
}

#[test]
fn duplicate_member_is_rejected() {
    let mut calibration = bundled();
    let dup = calibration.categories[0].clone();
    calibration.categories.push(dup);
    let (table, key) = calibration_error(calibration.validate());
    assert_eq!(table, "categories");
    assert_eq!(key, "E-commerce");
}

#[test]
fn unknown_conditional_key_is_rejected() {
    let mut calibration = bundled();
    calibration.failure_codes[1]
        .geography_weights
        .insert("Atlantis".to_string(), 2.0);
    let (table, key) = calibration_error(calibration.validate());
    assert_eq!(table, "failure_codes");
    assert_eq!(key, "do_not_honor.geography_weights.Atlantis");
}

#[test]
fn out_of_range_hour_is_rejected() {
    let mut calibration = bundled();
    calibration.seasonality.hour_weights.insert(24, 1.0);
    let (table, key) = calibration_error(calibration.validate());
    assert_eq!(table, "seasonality");
    assert!(key.contains("24"), "key {key}");
}

#[test]
fn undefined_day_profile_is_rejected() {
    let mut calibration = bundled();
    calibration.categories[2].day_profile = Some("nocturnal".to_string());
    let (table, _) = calibration_error(calibration.validate());
    assert_eq!(table, "categories");
}

#[test]
fn combination_without_any_code_mass_is_rejected() {
    let mut calibration = bundled();
    for code in &mut calibration.failure_codes {
        code.method_weights.insert("Bank Transfer".to_string(), 0.0);
    }
    let (table, key) = calibration_error(DistributionTables::compile(calibration));
    assert_eq!(table, "failure_codes");
    assert!(key.ends_with("/Bank Transfer"), "key {key}");
}

#[test]
fn generator_refuses_invalid_calibration() {
    let mut calibration = bundled();
    calibration.boundary.floor = 0.8;
    calibration.boundary.ceiling = 0.2;
    let (table, _) = calibration_error(Generator::build(calibration, 1));
    assert_eq!(table, "boundary");
}

#[test]
fn narrowing_to_unknown_member_fails() {
    let (table, key) = calibration_error(bundled().narrowed("Travel", "Mars", "Credit Card"));
    assert_eq!(table, "geographies");
    assert_eq!(key, "Mars");
}
