//! Per-row invariants of the generated table.
//!
//! Every row must hold these regardless of seed or calibration.

use chrono::{Datelike, Timelike};
use paysynth_core::{types::Status, Calibration, Generator};
use std::collections::HashSet;

fn bundled() -> Calibration {
    Calibration::bundled().expect("bundled calibration")
}

#[test]
fn every_row_satisfies_the_record_invariants() {
    let calibration = bundled();
    let categories: HashSet<String> = calibration.category_names().map(String::from).collect();
    let geographies: HashSet<String> = calibration.geography_names().map(String::from).collect();
    let methods: HashSet<String> = calibration.method_names().map(String::from).collect();
    let codes: HashSet<String> = calibration.failure_codes.iter().map(|c| c.code.clone()).collect();
    let retryable: HashSet<String> = calibration
        .failure_codes
        .iter()
        .filter(|c| c.retryable)
        .map(|c| c.code.clone())
        .collect();

    let generator = Generator::build(calibration, 31).unwrap();
    let window_start = generator.temporal().window_start();
    let window_end = generator.temporal().window_end();
    let table = generator.generate(30_000);
    assert_eq!(table.len(), 30_000);

    for r in table.rows() {
        assert!(r.amount_usd > 0.0, "{}: non-positive amount {}", r.transaction_id, r.amount_usd);
        assert_eq!(r.amount_usd, (r.amount_usd * 100.0).round() / 100.0, "amount not in cents");
        assert!((0.0..=1.0).contains(&r.pre_auth_risk_score));

        assert!(categories.contains(r.merchant_category), "unknown category {}", r.merchant_category);
        assert!(geographies.contains(r.geography), "unknown geography {}", r.geography);
        assert!(methods.contains(r.payment_method), "unknown method {}", r.payment_method);

        match r.status {
            Status::Failed => {
                let code = r.failure_code.expect("failed row without failure code");
                assert!(codes.contains(code), "unknown failure code {code}");
                assert_eq!(r.is_retryable, retryable.contains(code), "retryable flag disagrees with {code}");
            }
            Status::Success => {
                assert!(r.failure_code.is_none(), "{}: success with failure code", r.transaction_id);
                assert!(!r.is_retryable);
            }
        }
        if r.retry_recovered {
            assert!(r.is_retryable, "{}: recovered without being retryable", r.transaction_id);
        }
        assert_eq!(r.is_recoverable, r.is_retryable && !r.retry_recovered);

        assert!(r.timestamp >= window_start && r.timestamp < window_end, "timestamp {} outside window", r.timestamp);
        assert_eq!(r.hour_of_day, r.timestamp.hour());
        assert_eq!(r.day_of_week, r.timestamp.weekday().num_days_from_monday());
        assert_eq!(r.is_weekend, r.day_of_week >= 5);
        assert_eq!(r.month, r.timestamp.month());
        assert_eq!(r.year, r.timestamp.year());
    }
}

#[test]
fn merchant_category_is_fixed_per_merchant() {
    let generator = Generator::build(bundled(), 8).unwrap();
    let table = generator.generate(20_000);
    let population = generator.population();
    let tables = generator.tables();

    for r in table.rows() {
        let idx: usize = r.merchant_id.trim_start_matches("MID_").parse().unwrap();
        let merchant = population.get(idx);
        assert_eq!(merchant.merchant_id, r.merchant_id);
        assert_eq!(tables.category_name(merchant.category), r.merchant_category);
    }
}

#[test]
fn currency_follows_geography() {
    let calibration = bundled();
    let expected: Vec<(String, String)> = calibration
        .geographies
        .iter()
        .map(|g| (g.name.clone(), g.currency.clone()))
        .collect();
    let table_gen = Generator::build(calibration, 3).unwrap();
    for r in table_gen.generate(5_000).rows() {
        let (_, currency) = expected.iter().find(|(name, _)| name == r.geography).unwrap();
        assert_eq!(r.currency, currency.as_str());
    }
}

#[test]
fn single_combination_calibration_yields_only_that_combination() {
    let narrowed = bundled().narrowed("Travel", "US", "Credit Card").unwrap();
    let generator = Generator::build(narrowed, 42).unwrap();
    let table = generator.generate(5_000);

    assert_eq!(table.len(), 5_000);
    for r in table.rows() {
        assert_eq!(r.merchant_category, "Travel");
        assert_eq!(r.geography, "US");
        assert_eq!(r.currency, "USD");
        assert_eq!(r.payment_method, "Credit Card");
    }
    assert!(table.rows().iter().any(|r| r.is_failed()), "Travel should still fail sometimes");
}

#[test]
fn zero_transactions_yield_an_empty_table() {
    let generator = Generator::build(bundled(), 1).unwrap();
    let table = generator.generate(0);
    assert!(table.is_empty());
    assert_eq!(table.to_csv().lines().count(), 1, "header only");
}

#[test]
fn partial_final_chunk_is_respected() {
    let generator = Generator::build(bundled(), 1).unwrap();
    assert_eq!(generator.generate(4_097).len(), 4_097);
    assert_eq!(generator.generate(1).len(), 1);
}

#[test]
fn degenerate_amount_draws_are_clamped_not_propagated() {
    let mut calibration = bundled();
    for cat in &mut calibration.categories {
        cat.amount_sigma = 400.0;
    }
    let floor = calibration.amounts.floor_usd;
    let ceiling = calibration.amounts.ceiling_usd;

    let generator = Generator::build(calibration, 42).unwrap();
    let table = generator.generate(20_000);
    assert_eq!(table.len(), 20_000, "a bad draw must not cut the run short");

    let mut at_ceiling = 0;
    for r in table.rows() {
        assert!(
            (floor..=ceiling).contains(&r.amount_usd),
            "{}: amount {} outside [{floor}, {ceiling}]",
            r.transaction_id,
            r.amount_usd
        );
        assert!((0.0..=1.0).contains(&r.pre_auth_risk_score));
        if r.amount_usd == ceiling {
            at_ceiling += 1;
        }
    }
    assert!(at_ceiling > 0, "overflowing draws should land on the ceiling");
}
