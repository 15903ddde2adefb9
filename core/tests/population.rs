//! Merchant pool shape: fixed size, normalised weights, heavy head.

use paysynth_core::{
    merchant_population::MerchantPopulation,
    rng::{RngBank, StreamRng, StreamSlot},
    tables::DistributionTables,
    Calibration, Generator,
};

fn tables() -> DistributionTables {
    DistributionTables::compile(Calibration::bundled().unwrap()).unwrap()
}

#[test]
fn pool_has_configured_size_and_unique_ids() {
    let tables = tables();
    let mut rng = RngBank::new(42).for_slot(StreamSlot::Population);
    let pop = MerchantPopulation::generate(&tables, &mut rng).unwrap();

    assert_eq!(pop.len(), 5_000);
    let mut ids: Vec<&str> = pop.merchants().iter().map(|m| m.merchant_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5_000, "merchant ids must be unique");
    assert_eq!(pop.get(0).merchant_id, "MID_00000");
    assert_eq!(pop.get(4_999).merchant_id, "MID_04999");
}

#[test]
fn weights_are_positive_and_sum_to_one() {
    let tables = tables();
    let mut rng = RngBank::new(7).for_slot(StreamSlot::Population);
    let pop = MerchantPopulation::generate(&tables, &mut rng).unwrap();

    assert!(pop.merchants().iter().all(|m| m.weight > 0.0));
    assert!((pop.total_weight() - 1.0).abs() < 1e-9, "total weight {}", pop.total_weight());
}

#[test]
fn top_one_percent_hold_an_outsized_share() {
    for seed in [1, 42, 1234] {
        let generator = Generator::build(Calibration::bundled().unwrap(), seed).unwrap();
        let share = generator.population().top_weight_share(0.01);
        assert!(share > 0.10, "seed {seed}: top 1% share {share:.3} is not concentrated");
        assert!(share < 0.60, "seed {seed}: top 1% share {share:.3} is implausibly high");
    }
}

#[test]
fn sampled_volume_follows_the_weights() {
    let generator = Generator::build(Calibration::bundled().unwrap(), 42).unwrap();
    let pop = generator.population();

    let mut by_weight: Vec<usize> = (0..pop.len()).collect();
    by_weight.sort_by(|&a, &b| pop.get(b).weight.total_cmp(&pop.get(a).weight));
    let top: std::collections::HashSet<usize> = by_weight[..pop.len() / 100].iter().copied().collect();

    let mut rng = StreamRng::new(99, 1);
    const DRAWS: usize = 200_000;
    let hits = (0..DRAWS).filter(|_| top.contains(&pop.sample_index(&mut rng))).count();
    let observed = hits as f64 / DRAWS as f64;
    let expected = pop.top_weight_share(0.01);

    assert!(observed > 0.10, "top 1% drew only {observed:.3} of volume");
    assert!((observed - expected).abs() < 0.01, "observed {observed:.4} vs weight share {expected:.4}");
}

#[test]
fn pool_is_reproducible_per_seed() {
    let a = Generator::build(Calibration::bundled().unwrap(), 11).unwrap();
    let b = Generator::build(Calibration::bundled().unwrap(), 11).unwrap();
    assert_eq!(a.population().merchants(), b.population().merchants());
}
