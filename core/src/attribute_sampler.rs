use crate::{
    merchant_population::{Merchant, MerchantPopulation},
    rng::StreamRng,
    tables::DistributionTables,
    types::DimIndex,
};

/// Categorical and monetary attributes of one transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionAttributes<'p> {
    pub merchant: &'p Merchant,
    pub category: DimIndex,
    pub geography: DimIndex,
    pub payment_method: DimIndex,
    pub amount_usd: f64,
}

pub struct AttributeSampler<'a> {
    tables: &'a DistributionTables,
    population: &'a MerchantPopulation,
}

impl<'a> AttributeSampler<'a> {
    pub fn new(tables: &'a DistributionTables, population: &'a MerchantPopulation) -> Self {
        Self { tables, population }
    }

    /// Draw order is fixed: merchant, geography, method, amount.
    /// Category comes from the merchant; geography and method are
    /// independent of merchant identity.
    pub fn sample(&self, rng: &mut StreamRng) -> TransactionAttributes<'a> {
        let merchant = self.population.sample(rng);
        let geography = self.tables.sample_geography(rng);
        let payment_method = self.tables.sample_method(rng);
        let amount_usd = self.tables.sample_amount(merchant.category, rng);

        TransactionAttributes {
            merchant,
            category: merchant.category,
            geography,
            payment_method,
            amount_usd,
        }
    }
}
