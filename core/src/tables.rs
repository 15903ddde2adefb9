//! Compiled distribution tables.
//!
//! A validated Calibration turned into ready-to-draw samplers. Built once
//! before generation, shared read-only by every worker afterwards.
//! Every lookup is total over the calibrated enumerations.

use crate::{
    config::{Calibration, CategoryConfig, FailureCodeConfig},
    error::{GenError, GenResult},
    rng::StreamRng,
    types::DimIndex,
};
use rand::distributions::{Distribution, WeightedIndex};
use rand_distr::LogNormal;

#[derive(Debug, Clone)]
pub struct DistributionTables {
    calibration: Calibration,
    category_sampler: WeightedIndex<f64>,
    geography_sampler: WeightedIndex<f64>,
    method_sampler: WeightedIndex<f64>,
    amount_models: Vec<LogNormal<f64>>,
    /// geography × method failure multiplier, row-major by geography.
    context_multipliers: Vec<f64>,
    /// One code sampler per (category, geography, method), row-major.
    code_samplers: Vec<WeightedIndex<f64>>,
    hour_weights: [f64; 24],
    /// Per category, Monday-first.
    day_weights: Vec<[f64; 7]>,
}

impl DistributionTables {
    /// Validate the calibration and precompute every sampler.
    pub fn compile(calibration: Calibration) -> GenResult<Self> {
        calibration.validate()?;

        let category_sampler = weighted(
            "categories",
            "popularity",
            calibration.categories.iter().map(|c| c.popularity),
        )?;
        let geography_sampler = weighted(
            "geographies",
            "popularity",
            calibration.geographies.iter().map(|g| g.popularity),
        )?;
        let method_sampler = weighted(
            "payment_methods",
            "popularity",
            calibration.payment_methods.iter().map(|m| m.popularity),
        )?;

        let amount_models = calibration
            .categories
            .iter()
            .map(|c| {
                LogNormal::new(c.avg_amount.ln(), c.amount_sigma).map_err(|e| {
                    GenError::calibration("categories", &c.name, format!("bad amount model: {e}"))
                })
            })
            .collect::<GenResult<Vec<_>>>()?;

        let context_multipliers = calibration
            .geographies
            .iter()
            .flat_map(|g| {
                calibration
                    .payment_methods
                    .iter()
                    .map(move |m| g.fail_multiplier * m.fail_multiplier)
            })
            .collect();

        let mut code_samplers = Vec::with_capacity(
            calibration.categories.len() * calibration.geographies.len() * calibration.payment_methods.len(),
        );
        for cat in &calibration.categories {
            for geo in &calibration.geographies {
                for method in &calibration.payment_methods {
                    let key = format!("{}/{}/{}", cat.name, geo.name, method.name);
                    let weights = calibration
                        .failure_codes
                        .iter()
                        .map(|code| code.weight_for(&cat.name, &geo.name, &method.name));
                    let sampler = WeightedIndex::new(weights).map_err(|e| {
                        GenError::calibration("failure_codes", key, format!("no code can be drawn: {e}"))
                    })?;
                    code_samplers.push(sampler);
                }
            }
        }

        let mut hour_weights = [0.0; 24];
        for (hour, w) in hour_weights.iter_mut().enumerate() {
            *w = calibration.hour_weight(hour as u32);
        }

        let day_weights = calibration
            .categories
            .iter()
            .map(|cat| {
                let mut days = [0.0; 7];
                for (day, w) in days.iter_mut().enumerate() {
                    *w = calibration.day_weight(cat, day as u32);
                }
                days
            })
            .collect();

        log::info!(
            "calibration {} compiled: {} categories, {} geographies, {} methods, {} failure codes",
            calibration.version,
            calibration.categories.len(),
            calibration.geographies.len(),
            calibration.payment_methods.len(),
            calibration.failure_codes.len(),
        );

        Ok(Self {
            calibration,
            category_sampler,
            geography_sampler,
            method_sampler,
            amount_models,
            context_multipliers,
            code_samplers,
            hour_weights,
            day_weights,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    // ── Enumerations ───────────────────────────────────────────

    pub fn category_count(&self) -> usize {
        self.calibration.categories.len()
    }

    pub fn geography_count(&self) -> usize {
        self.calibration.geographies.len()
    }

    pub fn method_count(&self) -> usize {
        self.calibration.payment_methods.len()
    }

    pub fn category(&self, idx: DimIndex) -> &CategoryConfig {
        &self.calibration.categories[idx]
    }

    pub fn category_name(&self, idx: DimIndex) -> &str {
        &self.calibration.categories[idx].name
    }

    pub fn geography_name(&self, idx: DimIndex) -> &str {
        &self.calibration.geographies[idx].name
    }

    pub fn currency(&self, geography: DimIndex) -> &str {
        &self.calibration.geographies[geography].currency
    }

    pub fn method_name(&self, idx: DimIndex) -> &str {
        &self.calibration.payment_methods[idx].name
    }

    pub fn failure_code(&self, idx: DimIndex) -> &FailureCodeConfig {
        &self.calibration.failure_codes[idx]
    }

    // ── Draws ──────────────────────────────────────────────────

    pub fn sample_category(&self, rng: &mut StreamRng) -> DimIndex {
        self.category_sampler.sample(rng)
    }

    pub fn sample_geography(&self, rng: &mut StreamRng) -> DimIndex {
        self.geography_sampler.sample(rng)
    }

    pub fn sample_method(&self, rng: &mut StreamRng) -> DimIndex {
        self.method_sampler.sample(rng)
    }

    /// Log-normal amount for a category, rounded to cents and clamped to
    /// the calibrated range. Non-finite draws land on the ceiling.
    pub fn sample_amount(&self, category: DimIndex, rng: &mut StreamRng) -> f64 {
        let raw: f64 = self.amount_models[category].sample(rng);
        let bounds = &self.calibration.amounts;
        if !raw.is_finite() {
            log::warn!("non-finite amount draw for category {category}; clamped to ceiling");
            return bounds.ceiling_usd;
        }
        let cents = (raw * 100.0).round() / 100.0;
        cents.clamp(bounds.floor_usd, bounds.ceiling_usd)
    }

    pub fn sample_failure_code(
        &self,
        category: DimIndex,
        geography: DimIndex,
        method: DimIndex,
        rng: &mut StreamRng,
    ) -> DimIndex {
        self.code_samplers[self.combination(category, geography, method)].sample(rng)
    }

    // ── Lookups ────────────────────────────────────────────────

    pub fn baseline_risk(&self, category: DimIndex) -> f64 {
        self.calibration.categories[category].baseline_risk
    }

    /// Multiplicative failure adjustment for a geography × method pair.
    pub fn context_multiplier(&self, geography: DimIndex, method: DimIndex) -> f64 {
        self.context_multipliers[geography * self.method_count() + method]
    }

    /// Conditional weight of a failure code for one combination.
    pub fn failure_code_weight(
        &self,
        code: DimIndex,
        category: DimIndex,
        geography: DimIndex,
        method: DimIndex,
    ) -> f64 {
        self.calibration.failure_codes[code].weight_for(
            self.category_name(category),
            self.geography_name(geography),
            self.method_name(method),
        )
    }

    pub fn hour_weights(&self) -> &[f64; 24] {
        &self.hour_weights
    }

    pub fn day_weights(&self, category: DimIndex) -> &[f64; 7] {
        &self.day_weights[category]
    }

    fn combination(&self, category: DimIndex, geography: DimIndex, method: DimIndex) -> usize {
        (category * self.geography_count() + geography) * self.method_count() + method
    }
}

fn weighted(
    table: &'static str,
    key: &str,
    weights: impl Iterator<Item = f64>,
) -> GenResult<WeightedIndex<f64>> {
    WeightedIndex::new(weights).map_err(|e| GenError::calibration(table, key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wild_amount_tables() -> DistributionTables {
        let mut calibration = Calibration::bundled().unwrap();
        for cat in &mut calibration.categories {
            cat.amount_sigma = 400.0;
        }
        DistributionTables::compile(calibration).unwrap()
    }

    #[test]
    fn overflowing_amount_draws_land_on_the_bounds() {
        let tables = wild_amount_tables();
        let bounds = tables.calibration().amounts.clone();
        let mut rng = StreamRng::new(4, 4);
        let mut at_ceiling = 0;
        let mut at_floor = 0;
        for i in 0..5_000 {
            let amount = tables.sample_amount(i % tables.category_count(), &mut rng);
            assert!(amount.is_finite(), "non-finite amount escaped: {amount}");
            assert!((bounds.floor_usd..=bounds.ceiling_usd).contains(&amount), "amount {amount}");
            if amount == bounds.ceiling_usd {
                at_ceiling += 1;
            }
            if amount == bounds.floor_usd {
                at_floor += 1;
            }
        }
        assert!(at_ceiling > 0, "no draw reached the ceiling");
        assert!(at_floor > 0, "no draw reached the floor");
    }

    #[test]
    fn code_weights_follow_conditional_maps() {
        let tables = DistributionTables::compile(Calibration::bundled().unwrap()).unwrap();
        let card_expired = (0..tables.calibration().failure_codes.len())
            .find(|&c| tables.failure_code(c).code == "card_expired")
            .unwrap();
        let bank_transfer = (0..tables.method_count())
            .find(|&m| tables.method_name(m) == "Bank Transfer")
            .unwrap();
        assert_eq!(tables.failure_code_weight(card_expired, 0, 0, bank_transfer), 0.0);
        assert!(tables.failure_code_weight(card_expired, 0, 0, 0) > 0.0);
    }
}
