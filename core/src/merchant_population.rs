//! Merchant population — the fixed pool every transaction draws from.
//!
//! Built once per run from the population stream, before any transaction
//! is generated. Never grows or shrinks afterwards.

use crate::{
    error::{GenError, GenResult},
    rng::StreamRng,
    tables::DistributionTables,
    types::DimIndex,
};
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Merchant {
    pub merchant_id: String,
    pub category: DimIndex,
    /// Share of transaction volume. Weights across the pool sum to 1.0.
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct MerchantPopulation {
    merchants: Vec<Merchant>,
    sampler: WeightedIndex<f64>,
}

impl MerchantPopulation {
    /// Draw the pool: a category per merchant from the popularity table,
    /// then a capped Pareto weight, normalised over the pool.
    pub fn generate(tables: &DistributionTables, rng: &mut StreamRng) -> GenResult<Self> {
        let cfg = &tables.calibration().population;
        let mut merchants = Vec::with_capacity(cfg.merchant_count);

        for i in 0..cfg.merchant_count {
            let category = tables.sample_category(rng);
            let weight = rng.pareto(1.0, cfg.pareto_alpha).min(cfg.weight_cap);
            merchants.push(Merchant {
                merchant_id: format!("MID_{i:05}"),
                category,
                weight,
            });
        }

        let total: f64 = merchants.iter().map(|m| m.weight).sum();
        for m in &mut merchants {
            m.weight /= total;
        }

        let sampler = WeightedIndex::new(merchants.iter().map(|m| m.weight)).map_err(|e| {
            GenError::calibration("population", "merchant_count", format!("cannot weight pool: {e}"))
        })?;

        let population = Self { merchants, sampler };
        log::debug!(
            "merchant pool: {} merchants, top 1% hold {:.1}% of volume, largest {:.2}%",
            population.len(),
            population.top_weight_share(0.01) * 100.0,
            population.merchants.iter().map(|m| m.weight).fold(0.0, f64::max) * 100.0,
        );
        Ok(population)
    }

    pub fn len(&self) -> usize {
        self.merchants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
    }

    pub fn merchants(&self) -> &[Merchant] {
        &self.merchants
    }

    pub fn get(&self, idx: usize) -> &Merchant {
        &self.merchants[idx]
    }

    /// Sum of all weights; 1.0 up to rounding.
    pub fn total_weight(&self) -> f64 {
        self.merchants.iter().map(|m| m.weight).sum()
    }

    /// Weighted draw. Binary search over cumulative weights, O(log n).
    pub fn sample_index(&self, rng: &mut StreamRng) -> usize {
        self.sampler.sample(rng)
    }

    pub fn sample(&self, rng: &mut StreamRng) -> &Merchant {
        &self.merchants[self.sample_index(rng)]
    }

    /// Combined weight of the heaviest `fraction` of merchants
    /// (at least one merchant).
    pub fn top_weight_share(&self, fraction: f64) -> f64 {
        let mut weights: Vec<f64> = self.merchants.iter().map(|m| m.weight).collect();
        weights.sort_by(|a, b| b.total_cmp(a));
        let take = ((weights.len() as f64 * fraction).ceil() as usize).clamp(1, weights.len());
        weights[..take].iter().sum::<f64>() / self.total_weight()
    }
}
